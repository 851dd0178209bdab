use url::Url;

use crate::api::{resolve_media_url, Article, ArticlePayload, Category};
use crate::categories::CategoryCache;
use crate::validation::{
    validate_description, validate_required, validate_title, Checks, ValidationError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub cover_image_url: String,
    pub category_name: String,
}

impl ArticleDraft {
    /// Prefills a draft for editing. The cover URL is made absolute.
    pub fn from_article(article: &Article, base: &Url) -> Self {
        Self {
            title: article.title.clone(),
            description: article.description.clone(),
            cover_image_url: article
                .cover_image_url
                .as_deref()
                .map(|url| resolve_media_url(base, url))
                .unwrap_or_default(),
            category_name: article
                .category
                .as_ref()
                .map(|category| category.name.clone())
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        Checks::new()
            .field("title", validate_title(&self.title))
            .field("description", validate_description(&self.description))
            .field(
                "cover_image_url",
                validate_required(&self.cover_image_url, "Cover image URL is required"),
            )
            .field(
                "category",
                validate_required(&self.category_name, "Category is required"),
            )
            .finish()
    }

    /// Validates and turns the draft into a request payload, looking the
    /// category up by name.
    pub fn into_payload(self, categories: &[Category]) -> Result<ArticlePayload, ValidationError> {
        self.validate()?;

        let category = categories
            .iter()
            .find(|category| category.name == self.category_name)
            .ok_or_else(|| ValidationError::single("category", "Please select a valid category"))?;

        Ok(ArticlePayload {
            title: self.title,
            description: self.description,
            cover_image_url: self.cover_image_url,
            category: category.id,
        })
    }

    /// Like [`into_payload`](Self::into_payload), looking the category up
    /// through the shared cache.
    pub async fn resolve(self, categories: &CategoryCache) -> crate::Result<ArticlePayload> {
        self.validate()?;
        let category = categories.find_by_name(&self.category_name).await?;
        match category {
            Some(category) => Ok(self.into_payload(&[category])?),
            None => {
                Err(ValidationError::single("category", "Please select a valid category").into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ContentApi, MockContentApi};
    use crate::WayfarerError;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn categories() -> Vec<Category> {
        vec![Category::new(1, "Beach"), Category::new(2, "Mountain")]
    }

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "Sunrise at Bromo".into(),
            description: "Cold, early and worth every minute.".into(),
            cover_image_url: "https://cdn.example.com/bromo.jpg".into(),
            category_name: "Mountain".into(),
        }
    }

    #[test]
    fn test_into_payload() {
        let payload = draft().into_payload(&categories()).unwrap();
        assert_eq!(
            payload,
            ArticlePayload {
                title: "Sunrise at Bromo".into(),
                description: "Cold, early and worth every minute.".into(),
                cover_image_url: "https://cdn.example.com/bromo.jpg".into(),
                category: 2,
            }
        );
    }

    #[test]
    fn test_all_fields_reported() {
        let err = ArticleDraft::default().validate().unwrap_err();
        assert_eq!(err.fields.len(), 4);
        assert_eq!(err.message_for("title"), Some("Title is required"));
        assert_eq!(err.message_for("cover_image_url"), Some("Cover image URL is required"));
        assert_eq!(err.message_for("category"), Some("Category is required"));
    }

    #[test]
    fn test_unknown_category() {
        let err = ArticleDraft {
            category_name: "Desert".into(),
            ..draft()
        }
        .into_payload(&categories())
        .unwrap_err();
        assert_eq!(err.to_string(), "Please select a valid category");
    }

    #[test]
    fn test_from_article_resolves_cover() {
        let api = MockContentApi::new().with_categories(categories());
        let article = api.add_article("Ijen blue fire", Some("Mountain"));

        let draft = ArticleDraft::from_article(&article, api.base_url());
        assert_eq!(
            draft.cover_image_url,
            format!("http://mock.local/uploads/{}.jpg", article.id)
        );
        assert_eq!(draft.category_name, "Mountain");
    }

    #[tokio::test]
    async fn test_resolve_through_cache() {
        let api = Arc::new(MockContentApi::new().with_categories(categories()));
        let cache = CategoryCache::new(Arc::clone(&api) as Arc<dyn ContentApi>);

        let payload = draft().resolve(&cache).await.unwrap();
        assert_eq!(payload.category, 2);

        let err = ArticleDraft {
            title: "Bali".into(),
            ..draft()
        }
        .resolve(&cache)
        .await
        .unwrap_err();
        assert!(matches!(err, WayfarerError::Validation(_)));
        assert_eq!(api.calls("list_categories"), 1);
    }
}
