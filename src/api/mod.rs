pub mod client;
pub mod error;
pub mod http;
pub mod mock;
pub mod query;
pub mod types;

pub use client::{extract_upload_url, resolve_media_url, upload_cover_image, ContentApi};
pub use error::ApiError;
pub use http::HttpContentApi;
pub use mock::MockContentApi;
pub use query::{ArticleQuery, SortOrder};
pub use types::*;
