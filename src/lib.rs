pub mod api;
pub mod articles;
pub mod categories;
pub mod comments;
pub mod config;
pub mod error;
pub mod session;
pub mod validation;

pub use error::{Result, WayfarerError};
