use async_trait::async_trait;
use url::Url;

use crate::api::error::ApiError;
use crate::api::query::ArticleQuery;
use crate::api::types::{
    Article, ArticlePayload, AuthResponse, Category, Comment, ListResponse, UploadedFile,
};

/// Everything the application asks of the remote content API.
#[async_trait]
pub trait ContentApi: Send + Sync {
    fn base_url(&self) -> &Url;

    /// Installs (or removes) the bearer token sent with later calls.
    fn set_token(&self, token: Option<String>);

    fn has_token(&self) -> bool;

    async fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ApiError>;

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError>;

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ListResponse<Article>, ApiError>;

    async fn get_article(&self, document_id: &str) -> Result<Article, ApiError>;

    async fn create_article(&self, payload: &ArticlePayload) -> Result<Article, ApiError>;

    async fn update_article(
        &self,
        document_id: &str,
        payload: &ArticlePayload,
    ) -> Result<Article, ApiError>;

    async fn delete_article(&self, document_id: &str) -> Result<(), ApiError>;

    async fn list_comments(
        &self,
        article_id: &str,
        page: u32,
    ) -> Result<ListResponse<Comment>, ApiError>;

    async fn create_comment(&self, content: &str, article_id: &str) -> Result<Comment, ApiError>;

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment, ApiError>;

    async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError>;

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;

    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, ApiError>;
}

/// Media URLs come back relative to the API host (`/uploads/x.jpg`).
pub fn resolve_media_url(base: &Url, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    base.join(url.trim_start_matches('/'))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| url.to_string())
}

pub fn extract_upload_url(base: &Url, files: &[UploadedFile]) -> Result<String, ApiError> {
    files
        .first()
        .and_then(|file| file.url.as_deref())
        .filter(|url| !url.is_empty())
        .map(|url| resolve_media_url(base, url))
        .ok_or_else(|| ApiError::InvalidResponse("Upload response missing URL".to_string()))
}

/// Reads a local image and uploads it, returning the absolute URL of the
/// stored file.
pub async fn upload_cover_image(
    api: &dyn ContentApi,
    path: &std::path::Path,
) -> Result<String, ApiError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let files = api.upload_image(&file_name, bytes).await?;
    extract_upload_url(api.base_url(), &files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/").unwrap()
    }

    #[test]
    fn test_resolve_media_url() {
        assert_eq!(
            resolve_media_url(&base(), "/uploads/bali.jpg"),
            "https://api.example.com/uploads/bali.jpg"
        );
        assert_eq!(
            resolve_media_url(&base(), "https://cdn.example.com/bali.jpg"),
            "https://cdn.example.com/bali.jpg"
        );
    }

    #[test]
    fn test_extract_upload_url() {
        let files = vec![UploadedFile {
            id: 1,
            url: Some("/uploads/a.png".into()),
            name: Some("a.png".into()),
        }];
        assert_eq!(
            extract_upload_url(&base(), &files).unwrap(),
            "https://api.example.com/uploads/a.png"
        );

        let missing = vec![UploadedFile {
            id: 2,
            url: None,
            name: None,
        }];
        let err = extract_upload_url(&base(), &missing).unwrap_err();
        assert_eq!(err.to_string(), "Upload response missing URL");
        assert!(extract_upload_url(&base(), &[]).is_err());
    }
}
