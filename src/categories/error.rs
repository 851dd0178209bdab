use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;

/// Cloneable so one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone)]
pub enum CategoryError {
    #[error("Failed to load categories: {0}")]
    Fetch(Arc<ApiError>),
}

impl From<ApiError> for CategoryError {
    fn from(error: ApiError) -> Self {
        CategoryError::Fetch(Arc::new(error))
    }
}
