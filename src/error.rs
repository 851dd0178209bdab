use thiserror::Error;

use crate::api::ApiError;
use crate::categories::CategoryError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum WayfarerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Categories(#[from] CategoryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WayfarerError {
    /// The session is no longer accepted by the server.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, WayfarerError::Api(e) if e.is_unauthorized())
    }
}

pub type Result<T, E = WayfarerError> = std::result::Result<T, E>;
