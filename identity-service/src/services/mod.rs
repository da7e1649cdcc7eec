pub mod authenticator;
pub mod service_accounts;

pub use authenticator::{AssertedPrincipal, Authenticator, Credentials, StoreAuthenticator};
pub use service_accounts::ServiceAccountManager;
