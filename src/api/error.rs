use std::io;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unable to reach the server, check your connection and try again")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from server")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidResponse(String),

    #[error("Invalid API address")]
    Url(#[from] url::ParseError),

    #[error("Error reading file for upload")]
    Io(#[from] io::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl ApiError {
    /// Builds the error for a non-2xx answer, preferring the message the
    /// server put in `error.message` over the generic one for the status.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.error)
            .and_then(|detail| detail.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| status_message(status));

        ApiError::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The server refused the credentials. A 403 only means this user may
    /// not do that particular thing, so it does not count.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

pub fn status_message(status: u16) -> String {
    match status {
        400 => "The request was invalid, please check your input".to_string(),
        401 => "Invalid credentials or session expired, please log in again".to_string(),
        403 => "You do not have permission to perform this action".to_string(),
        404 => "The requested item could not be found".to_string(),
        413 => "The uploaded file is too large".to_string(),
        429 => "Too many requests, please wait a moment and try again".to_string(),
        500..=599 => "The server encountered an error, please try again later".to_string(),
        _ => format!("Request failed with status {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_wins() {
        let body = br#"{"data":null,"error":{"status":400,"name":"ValidationError","message":"Invalid identifier or password"}}"#;
        let error = ApiError::from_response(400, body);

        assert_eq!(error.to_string(), "Invalid identifier or password");
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn test_status_fallback() {
        let error = ApiError::from_response(404, b"not json");
        assert_eq!(error.to_string(), "The requested item could not be found");

        let error = ApiError::from_response(503, br#"{"error":{"message":"  "}}"#);
        assert_eq!(
            error.to_string(),
            "The server encountered an error, please try again later"
        );

        assert_eq!(status_message(418), "Request failed with status 418");
    }

    #[test]
    fn test_unauthorized() {
        assert!(ApiError::from_response(401, b"").is_unauthorized());
        assert!(!ApiError::from_response(403, b"").is_unauthorized());
        assert!(!ApiError::from_response(500, b"").is_unauthorized());
        assert!(!ApiError::InvalidResponse("x".into()).is_unauthorized());
    }
}
