use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::api::client::ContentApi;
use crate::api::error::ApiError;
use crate::api::query::{comment_params, ArticleQuery};
use crate::api::types::{
    Article, ArticlePayload, AuthResponse, Category, CategoryListBody, Comment, CommentPayload,
    DataEnvelope, ListResponse, LoginRequest, RegisterRequest, UploadedFile,
};
use crate::config::ClientConfig;

/// `ContentApi` over HTTP, talking to the Strapi-style REST endpoints.
pub struct HttpContentApi {
    http: Client,
    base_url: Url,
    page_size: u32,
    comment_page_size: u32,
    token: RwLock<Option<String>>,
}

impl HttpContentApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut base = config.api_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            page_size: config.page_size,
            comment_page_size: config.comment_page_size,
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        self.dispatch(self.authorize(request)).await
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();
        let body = response.bytes().await?;

        debug!("{} {} ({} bytes)", status.as_u16(), path, body.len());

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(body.to_vec())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let envelope: DataEnvelope<T> = self.send(request).await?;
        Ok(envelope.data)
    }

    async fn auth_call<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, ApiError> {
        let url = self.endpoint(path)?;
        // Credentials go out without any stale bearer token attached.
        let body = self.dispatch(self.http.post(url).json(body)).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = token;
    }

    fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ApiError> {
        debug!("logging in as {}", identifier);
        self.auth_call(
            "api/auth/local",
            &LoginRequest {
                identifier,
                password,
            },
        )
        .await
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        debug!("registering {}", username);
        self.auth_call(
            "api/auth/local/register",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
        .await
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ListResponse<Article>, ApiError> {
        let url = self.endpoint("api/articles")?;
        let params = query.to_params(self.page_size);
        self.send(self.http.get(url).query(&params)).await
    }

    async fn get_article(&self, document_id: &str) -> Result<Article, ApiError> {
        let url = self.endpoint(&format!("api/articles/{document_id}"))?;
        self.send_data(self.http.get(url).query(&[("populate", "*")]))
            .await
    }

    async fn create_article(&self, payload: &ArticlePayload) -> Result<Article, ApiError> {
        let url = self.endpoint("api/articles")?;
        self.send_data(self.http.post(url).json(&DataEnvelope { data: payload }))
            .await
    }

    async fn update_article(
        &self,
        document_id: &str,
        payload: &ArticlePayload,
    ) -> Result<Article, ApiError> {
        let url = self.endpoint(&format!("api/articles/{document_id}"))?;
        self.send_data(self.http.put(url).json(&DataEnvelope { data: payload }))
            .await
    }

    async fn delete_article(&self, document_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/articles/{document_id}"))?;
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }

    async fn list_comments(
        &self,
        article_id: &str,
        page: u32,
    ) -> Result<ListResponse<Comment>, ApiError> {
        let url = self.endpoint("api/comments")?;
        let params = comment_params(article_id, page, self.comment_page_size);
        self.send(self.http.get(url).query(&params)).await
    }

    async fn create_comment(&self, content: &str, article_id: &str) -> Result<Comment, ApiError> {
        let url = self.endpoint("api/comments")?;
        let payload = CommentPayload {
            content,
            article: Some(article_id),
        };
        self.send_data(self.http.post(url).json(&DataEnvelope { data: payload }))
            .await
    }

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment, ApiError> {
        let url = self.endpoint(&format!("api/comments/{comment_id}"))?;
        let payload = CommentPayload {
            content,
            article: None,
        };
        self.send_data(self.http.put(url).json(&DataEnvelope { data: payload }))
            .await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/comments/{comment_id}"))?;
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let url = self.endpoint("api/categories")?;
        let body: CategoryListBody = self.send(self.http.get(url)).await?;
        Ok(body.into_categories())
    }

    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, ApiError> {
        let url = self.endpoint("api/upload")?;
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        debug!("uploading {} as {} ({} bytes)", file_name, mime, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part("files", part);

        self.send(self.http.post(url).multipart(form)).await
    }
}
