pub mod auth;
pub mod error;
pub mod store;

pub use auth::{AuthSession, AuthState};
pub use error::SessionError;
pub use store::{SessionStore, StoredAuth};
