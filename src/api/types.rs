use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub blocked: bool,
}

/// A category as the rest of the crate sees it. The API has served both
/// the flat shape and the older `attributes` wrapper; both land here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawCategory")]
pub struct Category {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCategory {
    Wrapped {
        id: u64,
        attributes: CategoryAttributes,
    },
    Flat {
        id: u64,
        #[serde(default)]
        name: String,
    },
}

#[derive(Deserialize)]
struct CategoryAttributes {
    #[serde(default)]
    name: String,
}

impl From<RawCategory> for Category {
    fn from(raw: RawCategory) -> Self {
        match raw {
            RawCategory::Wrapped { id, attributes } => Category {
                id,
                name: attributes.name,
            },
            RawCategory::Flat { id, name } => Category { id, name },
        }
    }
}

impl Category {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// `GET /api/categories` answers either `{"data": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum CategoryListBody {
    Bare(Vec<Category>),
    Wrapped {
        #[serde(default)]
        data: Option<Vec<Category>>,
    },
}

impl CategoryListBody {
    pub(crate) fn into_categories(self) -> Vec<Category> {
        let categories = match self {
            CategoryListBody::Bare(categories) => categories,
            CategoryListBody::Wrapped { data } => data.unwrap_or_default(),
        };

        categories
            .into_iter()
            .filter(|category| !category.name.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: u64,
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "cover_image_url")]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Article {
    pub fn category_name(&self) -> &str {
        self.category
            .as_ref()
            .map(|category| category.name.as_str())
            .unwrap_or("Destination")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Comment {
    /// Overlays a server record on this one. Fields the server left out
    /// (the populated user, typically) are kept.
    pub fn merge(&mut self, updated: Comment) {
        self.id = updated.id;
        self.content = updated.content;
        if updated.created_at.is_some() {
            self.created_at = updated.created_at;
        }
        if updated.updated_at.is_some() {
            self.updated_at = updated.updated_at;
        }
        if updated.user.is_some() {
            self.user = updated.user;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, pagination: Option<Pagination>) -> Self {
        Self {
            data,
            meta: Some(Meta { pagination }),
        }
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.meta.as_ref().and_then(|meta| meta.pagination)
    }
}

/// The `{"data": ...}` envelope used for single records in both
/// directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePayload {
    pub title: String,
    pub description: String,
    pub cover_image_url: String,
    pub category: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentPayload<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
