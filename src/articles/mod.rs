pub mod debounce;
pub mod feed;
pub mod form;

pub use debounce::{Debouncer, INPUT_DEBOUNCE};
pub use feed::{ArticleFeed, ArticleFilters, FeedState, FetchTicket};
pub use form::ArticleDraft;
