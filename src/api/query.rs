use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "createdAt:desc")]
    NewestFirst,
    #[serde(rename = "createdAt:asc")]
    OldestFirst,
    #[serde(rename = "title:asc")]
    TitleAscending,
    #[serde(rename = "title:desc")]
    TitleDescending,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::NewestFirst,
        SortOrder::OldestFirst,
        SortOrder::TitleAscending,
        SortOrder::TitleDescending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "createdAt:desc",
            SortOrder::OldestFirst => "createdAt:asc",
            SortOrder::TitleAscending => "title:asc",
            SortOrder::TitleDescending => "title:desc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "Newest First",
            SortOrder::OldestFirst => "Oldest First",
            SortOrder::TitleAscending => "Title A-Z",
            SortOrder::TitleDescending => "Title Z-A",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sort '{0}', expected one of {known}", known = known_orders())]
pub struct UnknownSortOrder(pub String);

fn known_orders() -> String {
    SortOrder::ALL
        .iter()
        .map(SortOrder::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| UnknownSortOrder(s.to_string()))
    }
}

/// One page request against `/api/articles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub page: u32,
    pub search: String,
    pub title_exact: String,
    pub category_name: String,
    pub sort: SortOrder,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search: String::new(),
            title_exact: String::new(),
            category_name: String::new(),
            sort: SortOrder::default(),
        }
    }
}

impl ArticleQuery {
    pub fn to_params(&self, page_size: u32) -> Vec<(String, String)> {
        let mut params = vec![
            ("pagination[page]".to_string(), self.page.max(1).to_string()),
            ("pagination[pageSize]".to_string(), page_size.to_string()),
            ("sort[0]".to_string(), self.sort.as_str().to_string()),
            ("populate".to_string(), "*".to_string()),
        ];

        let search = self.search.trim();
        if !search.is_empty() {
            params.push(("filters[title][$containsi]".to_string(), search.to_string()));
        }

        let title = self.title_exact.trim();
        if !title.is_empty() {
            params.push(("filters[title][$eqi]".to_string(), title.to_string()));
        }

        let category = self.category_name.trim();
        if !category.is_empty() {
            params.push((
                "filters[category][name][$eq]".to_string(),
                category.to_string(),
            ));
        }

        params
    }
}

pub fn comment_params(article_id: &str, page: u32, page_size: u32) -> Vec<(String, String)> {
    vec![
        (
            "filters[article][documentId][$eq]".to_string(),
            article_id.to_string(),
        ),
        ("pagination[page]".to_string(), page.max(1).to_string()),
        ("pagination[pageSize]".to_string(), page_size.to_string()),
        ("sort[0]".to_string(), "createdAt:desc".to_string()),
        ("populate".to_string(), "*".to_string()),
    ]
}
