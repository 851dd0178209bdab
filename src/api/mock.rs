use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use crate::api::client::ContentApi;
use crate::api::error::ApiError;
use crate::api::query::{ArticleQuery, SortOrder};
use crate::api::types::{
    Article, ArticlePayload, AuthResponse, Category, Comment, ListResponse, Pagination,
    UploadedFile, User,
};

const EPOCH: i64 = 1_735_689_600;

/// In-memory stand-in for the content API. Keeps just enough server
/// behaviour (auth, filtering, paging, ownership of ids) to drive the
/// state machines above it, and counts calls per endpoint.
pub struct MockContentApi {
    base_url: Url,
    page_size: u32,
    comment_page_size: u32,
    latency: Option<Duration>,
    token: Mutex<Option<String>>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    users: Vec<(User, String)>,
    articles: Vec<Article>,
    comments: Vec<(String, Comment)>,
    categories: Vec<Category>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    calls: HashMap<&'static str, usize>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, endpoint: &'static str) -> Result<(), ApiError> {
        *self.calls.entry(endpoint).or_default() += 1;
        match self.failures.get_mut(endpoint).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for MockContentApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContentApi {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse("http://mock.local/").expect("static url"),
            page_size: 9,
            comment_page_size: 10,
            latency: None,
            token: Mutex::new(None),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Every call sleeps this long (on the tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_categories(self, categories: Vec<Category>) -> Self {
        self.state().categories = categories;
        self
    }

    pub fn set_categories(&self, categories: Vec<Category>) {
        self.state().categories = categories;
    }

    pub fn add_user(&self, username: &str, email: &str, password: &str) -> User {
        let mut state = self.state();
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            blocked: false,
        };
        state.users.push((user.clone(), password.to_string()));
        user
    }

    pub fn add_article(&self, title: &str, category: Option<&str>) -> Article {
        let mut state = self.state();
        let id = state.next_id();
        let category = category.and_then(|name| {
            state
                .categories
                .iter()
                .find(|category| category.name == name)
                .cloned()
        });
        let article = Article {
            id,
            document_id: format!("article-{id}"),
            title: title.to_string(),
            description: format!("Notes from {title}"),
            cover_image_url: Some(format!("/uploads/{id}.jpg")),
            category,
            created_at: timestamp(id),
            updated_at: timestamp(id),
            published_at: timestamp(id),
            locale: None,
            user: None,
        };
        state.articles.push(article.clone());
        article
    }

    pub fn add_comment(&self, article_id: &str, content: &str) -> Comment {
        let mut state = self.state();
        let id = state.next_id();
        let comment = Comment {
            id,
            document_id: format!("comment-{id}"),
            content: content.to_string(),
            created_at: timestamp(id),
            updated_at: timestamp(id),
            user: None,
        };
        state.comments.push((article_id.to_string(), comment.clone()));
        comment
    }

    /// Queues an error for the next call to `endpoint` (the trait method
    /// name, e.g. `"list_categories"`).
    pub fn fail_next(&self, endpoint: &'static str, error: ApiError) {
        self.state()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.state().calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn articles(&self) -> Vec<Article> {
        self.state().articles.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn current_user(&self) -> Result<Option<User>, ApiError> {
        let token = self.token().ok_or_else(unauthorized)?;
        Ok(self
            .state()
            .users
            .iter()
            .find(|(user, _)| token == jwt_for(user))
            .map(|(user, _)| user.clone()))
    }

    fn resolve_category(&self, id: u64) -> Result<Category, ApiError> {
        self.state()
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 400,
                message: format!("Category {id} does not exist"),
            })
    }
}

fn timestamp(offset: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(EPOCH + offset as i64 * 60, 0).single()
}

fn jwt_for(user: &User) -> String {
    format!("mock-jwt-{}", user.id)
}

fn unauthorized() -> ApiError {
    ApiError::from_response(401, b"")
}

fn not_found() -> ApiError {
    ApiError::from_response(404, b"")
}

fn paginate<T: Clone>(items: &[T], page: u32, page_size: u32) -> ListResponse<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = items.len() as u64;
    let page_count = items.len().div_ceil(page_size as usize) as u32;
    let data = items
        .iter()
        .skip(((page - 1) * page_size) as usize)
        .take(page_size as usize)
        .cloned()
        .collect();

    ListResponse::new(
        data,
        Some(Pagination {
            page,
            page_size,
            page_count,
            total,
        }),
    )
}

#[async_trait]
impl ContentApi for MockContentApi {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn has_token(&self) -> bool {
        self.token().is_some()
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.delay().await;
        self.state().record("login")?;

        let state = self.state();
        state
            .users
            .iter()
            .find(|(user, secret)| {
                (user.username == identifier || user.email == identifier) && secret == password
            })
            .map(|(user, _)| AuthResponse {
                jwt: Some(jwt_for(user)),
                user: Some(user.clone()),
            })
            .ok_or_else(|| ApiError::Status {
                status: 400,
                message: "Invalid identifier or password".to_string(),
            })
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        self.delay().await;
        self.state().record("register")?;

        let taken = self
            .state()
            .users
            .iter()
            .any(|(user, _)| user.username == username || user.email == email);
        if taken {
            return Err(ApiError::Status {
                status: 400,
                message: "Email or Username are already taken".to_string(),
            });
        }

        let user = self.add_user(username, email, password);
        Ok(AuthResponse {
            jwt: Some(jwt_for(&user)),
            user: Some(user),
        })
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ListResponse<Article>, ApiError> {
        self.delay().await;
        self.state().record("list_articles")?;

        let search = query.search.trim().to_lowercase();
        let title = query.title_exact.trim().to_lowercase();
        let category = query.category_name.trim();

        let mut matching: Vec<Article> = self
            .state()
            .articles
            .iter()
            .filter(|a| search.is_empty() || a.title.to_lowercase().contains(&search))
            .filter(|a| title.is_empty() || a.title.to_lowercase() == title)
            .filter(|a| category.is_empty() || a.category_name() == category)
            .cloned()
            .collect();

        match query.sort {
            SortOrder::NewestFirst => matching.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => matching.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::TitleAscending => matching.sort_by(|a, b| a.title.cmp(&b.title)),
            SortOrder::TitleDescending => matching.sort_by(|a, b| b.title.cmp(&a.title)),
        }

        Ok(paginate(&matching, query.page, self.page_size))
    }

    async fn get_article(&self, document_id: &str) -> Result<Article, ApiError> {
        self.delay().await;
        self.state().record("get_article")?;

        self.state()
            .articles
            .iter()
            .find(|a| a.document_id == document_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_article(&self, payload: &ArticlePayload) -> Result<Article, ApiError> {
        self.delay().await;
        self.state().record("create_article")?;

        let user = self.current_user()?;
        let category = self.resolve_category(payload.category)?;

        let mut state = self.state();
        let id = state.next_id();
        let article = Article {
            id,
            document_id: format!("article-{id}"),
            title: payload.title.clone(),
            description: payload.description.clone(),
            cover_image_url: Some(payload.cover_image_url.clone()),
            category: Some(category),
            created_at: timestamp(id),
            updated_at: timestamp(id),
            published_at: timestamp(id),
            locale: None,
            user,
        };
        state.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        document_id: &str,
        payload: &ArticlePayload,
    ) -> Result<Article, ApiError> {
        self.delay().await;
        self.state().record("update_article")?;

        self.current_user()?;
        let category = self.resolve_category(payload.category)?;

        let mut state = self.state();
        let article = state
            .articles
            .iter_mut()
            .find(|a| a.document_id == document_id)
            .ok_or_else(not_found)?;
        article.title = payload.title.clone();
        article.description = payload.description.clone();
        article.cover_image_url = Some(payload.cover_image_url.clone());
        article.category = Some(category);
        Ok(article.clone())
    }

    async fn delete_article(&self, document_id: &str) -> Result<(), ApiError> {
        self.delay().await;
        self.state().record("delete_article")?;

        self.current_user()?;
        let mut state = self.state();
        let before = state.articles.len();
        state.articles.retain(|a| a.document_id != document_id);
        if state.articles.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn list_comments(
        &self,
        article_id: &str,
        page: u32,
    ) -> Result<ListResponse<Comment>, ApiError> {
        self.delay().await;
        self.state().record("list_comments")?;

        let mut comments: Vec<Comment> = self
            .state()
            .comments
            .iter()
            .filter(|(article, _)| article == article_id)
            .map(|(_, comment)| comment.clone())
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(paginate(&comments, page, self.comment_page_size))
    }

    async fn create_comment(&self, content: &str, article_id: &str) -> Result<Comment, ApiError> {
        self.delay().await;
        self.state().record("create_comment")?;

        let user = self.current_user()?;
        let mut comment = self.add_comment(article_id, content);
        comment.user = user.clone();
        if let Some((_, stored)) = self
            .state()
            .comments
            .iter_mut()
            .find(|(_, stored)| stored.id == comment.id)
        {
            stored.user = user;
        }
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment, ApiError> {
        self.delay().await;
        self.state().record("update_comment")?;

        self.current_user()?;
        let mut state = self.state();
        let id = state.next_id();
        let (_, comment) = state
            .comments
            .iter_mut()
            .find(|(_, c)| c.document_id == comment_id)
            .ok_or_else(not_found)?;
        comment.content = content.to_string();
        comment.updated_at = timestamp(id);

        // The live API answers updates without the populated relations.
        Ok(Comment {
            user: None,
            ..comment.clone()
        })
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<(), ApiError> {
        self.delay().await;
        self.state().record("delete_comment")?;

        self.current_user()?;
        let mut state = self.state();
        let before = state.comments.len();
        state.comments.retain(|(_, c)| c.document_id != comment_id);
        if state.comments.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.delay().await;
        self.state().record("list_categories")?;

        Ok(self.state().categories.clone())
    }

    async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, ApiError> {
        self.delay().await;
        self.state().record("upload_image")?;

        self.current_user()?;
        if bytes.is_empty() {
            return Err(ApiError::from_response(400, b""));
        }

        let id = self.state().next_id();
        Ok(vec![UploadedFile {
            id,
            url: Some(format!("/uploads/{file_name}")),
            name: Some(file_name.to_string()),
        }])
    }
}
