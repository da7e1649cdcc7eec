pub mod service_account;
pub mod user;

pub use service_account::ServiceAccount;
pub use user::User;
