pub mod cache;
pub mod error;

pub use cache::{CategoryCache, DEFAULT_FRESHNESS};
pub use error::CategoryError;
