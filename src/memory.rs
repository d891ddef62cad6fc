use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::article::{Article, ArticlePatch, ArticleQuery};
use crate::database::ArticleStore;
use crate::error::{AppError, AppResult};

/// Process-local article store. Used when no `DB_URL` is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Vec<Article>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn slug_taken() -> AppError {
    AppError::Conflict("An article with this slug already exists".to_string())
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn list(&self, query: &ArticleQuery) -> AppResult<Vec<Article>> {
        let articles = self.inner.read().await;
        let mut found: Vec<Article> = articles
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn get(&self, slug: &str) -> AppResult<Option<Article>> {
        let articles = self.inner.read().await;
        Ok(articles.iter().find(|a| a.slug == slug).cloned())
    }

    async fn insert(&self, article: Article) -> AppResult<Article> {
        let mut articles = self.inner.write().await;
        if articles.iter().any(|a| a.slug == article.slug) {
            return Err(slug_taken());
        }
        articles.push(article.clone());
        Ok(article)
    }

    async fn update(
        &self,
        slug: &str,
        patch: ArticlePatch,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Article>> {
        let mut articles = self.inner.write().await;
        let Some(index) = articles.iter().position(|a| a.slug == slug) else {
            return Ok(None);
        };
        if let Some(new_slug) = &patch.slug {
            if new_slug != slug && articles.iter().any(|a| &a.slug == new_slug) {
                return Err(slug_taken());
            }
        }
        let article = &mut articles[index];
        patch.apply(article, now);
        Ok(Some(article.clone()))
    }

    async fn delete(&self, slug: &str) -> AppResult<Option<Article>> {
        let mut articles = self.inner.write().await;
        let index = articles.iter().position(|a| a.slug == slug);
        Ok(index.map(|index| articles.remove(index)))
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.inner.read().await.len() as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
