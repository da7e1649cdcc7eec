pub mod handler;
pub mod negotiation;
pub mod options;
pub mod resource;
pub mod router;

pub use handler::{ListResponse, RestHandler, RestResponse};
pub use negotiation::ContentType;
pub use options::{Filter, FilterOperator, FilterValue, ListOptions, Paging};
pub use resource::{Manager, PatchManager, RepresentationType, Resource};
pub use router::resource_routes;
