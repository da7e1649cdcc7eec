pub mod auth;

pub use auth::authenticate_middleware;
