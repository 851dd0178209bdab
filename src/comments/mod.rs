pub mod thread;

pub use thread::{CommentThread, ThreadState};
