use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("Not logged in")]
    NotAuthenticated,
}
