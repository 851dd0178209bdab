use tracing::{debug, info, warn};

use crate::api::{ApiError, Comment, ContentApi};
use crate::validation::{validate_comment, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadState {
    pub comments: Vec<Comment>,
    pub total_pages: u32,
    pub current_page: u32,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self {
            comments: Vec::new(),
            total_pages: 1,
            current_page: 1,
            is_loading: false,
            error: None,
        }
    }
}

/// Comments under one article, newest first, paged on demand.
#[derive(Debug, Default)]
pub struct CommentThread {
    state: ThreadState,
}

impl CommentThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ThreadState {
        &self.state
    }

    pub fn comments(&self) -> &[Comment] {
        &self.state.comments
    }

    pub fn has_more(&self) -> bool {
        self.state.current_page < self.state.total_pages
    }

    pub async fn fetch(
        &mut self,
        api: &dyn ContentApi,
        article_id: &str,
        page: u32,
        reset: bool,
    ) -> Result<(), ApiError> {
        self.state.is_loading = true;
        self.state.error = None;
        debug!("fetching comments for {} page {}", article_id, page);

        let outcome = api.list_comments(article_id, page).await;
        self.state.is_loading = false;

        match outcome {
            Ok(response) => {
                let pagination = response.pagination();
                if reset {
                    self.state.comments = response.data;
                } else {
                    self.state.comments.extend(response.data);
                }
                self.state.current_page = pagination
                    .map(|p| p.page)
                    .filter(|page| *page > 0)
                    .unwrap_or(page);
                if let Some(pagination) = pagination {
                    self.state.total_pages = pagination.page_count;
                }
                Ok(())
            }
            Err(e) => {
                warn!("failed to fetch comments for {}: {}", article_id, e);
                self.state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn load_more(&mut self, api: &dyn ContentApi, article_id: &str) -> Result<bool, ApiError> {
        if self.state.is_loading || !self.has_more() {
            return Ok(false);
        }
        let next = self.state.current_page + 1;
        self.fetch(api, article_id, next, false).await?;
        Ok(true)
    }

    /// Posts a comment and puts it at the top of the thread. Content is
    /// trimmed before it is checked and sent.
    pub async fn create(
        &mut self,
        api: &dyn ContentApi,
        content: &str,
        article_id: &str,
    ) -> crate::Result<Comment> {
        validate_comment(content).map_err(|message| ValidationError::single("content", message))?;

        let comment = self.record(api.create_comment(content.trim(), article_id).await)?;
        info!("posted comment {}", comment.document_id);
        self.state.comments.insert(0, comment.clone());
        Ok(comment)
    }

    pub async fn update(
        &mut self,
        api: &dyn ContentApi,
        comment_id: &str,
        content: &str,
    ) -> crate::Result<()> {
        validate_comment(content).map_err(|message| ValidationError::single("content", message))?;

        let updated = self.record(api.update_comment(comment_id, content.trim()).await)?;
        if let Some(existing) = self
            .state
            .comments
            .iter_mut()
            .find(|comment| comment.document_id == comment_id)
        {
            existing.merge(updated);
        }
        Ok(())
    }

    pub async fn delete(&mut self, api: &dyn ContentApi, comment_id: &str) -> Result<(), ApiError> {
        self.record(api.delete_comment(comment_id).await)?;
        self.state
            .comments
            .retain(|comment| comment.document_id != comment_id);
        info!("deleted comment {}", comment_id);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.state = ThreadState::default();
    }

    fn record<T>(&mut self, outcome: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &outcome {
            self.state.error = Some(e.to_string());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockContentApi;
    use crate::WayfarerError;

    const ARTICLE: &str = "article-1";

    fn signed_in() -> MockContentApi {
        let api = MockContentApi::new();
        let user = api.add_user("rani", "rani@example.com", "password1");
        api.set_token(Some(format!("mock-jwt-{}", user.id)));
        api
    }

    fn contents(thread: &CommentThread) -> Vec<&str> {
        thread.comments().iter().map(|c| c.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fetch_pages_newest_first() {
        let api = MockContentApi::new();
        for i in 0..12 {
            api.add_comment(ARTICLE, &format!("comment {i}"));
        }
        api.add_comment("article-2", "elsewhere");

        let mut thread = CommentThread::new();
        thread.fetch(&api, ARTICLE, 1, true).await.unwrap();
        assert_eq!(thread.comments().len(), 10);
        assert_eq!(thread.comments()[0].content, "comment 11");
        assert!(thread.has_more());

        assert!(thread.load_more(&api, ARTICLE).await.unwrap());
        assert_eq!(thread.comments().len(), 12);
        assert!(!thread.has_more());
        assert!(!thread.load_more(&api, ARTICLE).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recorded_and_returned() {
        let api = MockContentApi::new();
        api.fail_next("list_comments", ApiError::from_response(503, b""));

        let mut thread = CommentThread::new();
        assert!(thread.fetch(&api, ARTICLE, 1, true).await.is_err());
        assert!(thread.state().error.is_some());
        assert!(!thread.state().is_loading);
    }

    #[tokio::test]
    async fn test_create_trims_and_prepends() {
        let api = signed_in();
        api.add_comment(ARTICLE, "first!");

        let mut thread = CommentThread::new();
        thread.fetch(&api, ARTICLE, 1, true).await.unwrap();

        let created = thread.create(&api, "  Great spot  ", ARTICLE).await.unwrap();
        assert_eq!(created.content, "Great spot");
        assert_eq!(contents(&thread), ["Great spot", "first!"]);
        assert_eq!(created.user.unwrap().username, "rani");
    }

    #[tokio::test]
    async fn test_create_rejects_short_content_without_calling_api() {
        let api = signed_in();
        let mut thread = CommentThread::new();

        let err = thread.create(&api, " ok ", ARTICLE).await.unwrap_err();
        assert!(matches!(err, WayfarerError::Validation(_)));
        assert_eq!(err.to_string(), "Comment must be at least 3 characters long");
        assert_eq!(api.calls("create_comment"), 0);
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_author() {
        let api = signed_in();
        let mut thread = CommentThread::new();
        let created = thread.create(&api, "Lovely beach", ARTICLE).await.unwrap();

        thread
            .update(&api, &created.document_id, "Lovely beach, busy at noon")
            .await
            .unwrap();

        let comment = &thread.comments()[0];
        assert_eq!(comment.content, "Lovely beach, busy at noon");
        assert_eq!(comment.user.as_ref().unwrap().username, "rani");
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let api = signed_in();
        let mut thread = CommentThread::new();
        let keep = thread.create(&api, "keep this", ARTICLE).await.unwrap();
        let gone = thread.create(&api, "drop this", ARTICLE).await.unwrap();

        thread.delete(&api, &gone.document_id).await.unwrap();
        assert_eq!(contents(&thread), ["keep this"]);

        assert!(thread.delete(&api, "comment-missing").await.is_err());
        assert_eq!(thread.comments()[0].document_id, keep.document_id);

        thread.clear();
        assert!(thread.comments().is_empty());
        assert_eq!(thread.state(), &ThreadState::default());
    }

    #[tokio::test]
    async fn test_mutations_require_session() {
        let api = MockContentApi::new();
        let mut thread = CommentThread::new();

        let err = thread.create(&api, "Hello there", ARTICLE).await.unwrap_err();
        assert!(matches!(err, WayfarerError::Api(ref e) if e.is_unauthorized()));
        assert!(thread.comments().is_empty());
    }
}
