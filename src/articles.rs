use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::article::{Article, ArticleInput, ArticleQuery, ListParams};
use crate::error::{AppError, AppResult};
use crate::{generate_object_id, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleList {
    pub articles: Vec<Article>,
}

pub async fn list_articles(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<ArticleList>> {
    let Query(params) = params?;
    let query = ArticleQuery::from(params);
    tracing::debug!(?query, "list_articles");

    let articles = state.store.list(&query).await?;
    tracing::debug!("found {} articles", articles.len());
    Ok(Json(ArticleList { articles }))
}

pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Article>> {
    match state.store.get(&slug).await? {
        Some(article) => Ok(Json(article)),
        None => Err(AppError::article_not_found()),
    }
}

pub async fn create_article(
    State(state): State<AppState>,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> AppResult<Json<Article>> {
    tracing::info!("create_article started");
    let Json(input) = payload?;
    let article = input.into_article(generate_object_id(), Utc::now())?;

    let article = state.store.insert(article).await.map_err(|e| {
        tracing::error!("create_article failed: {}", e);
        e
    })?;
    tracing::info!(slug = %article.slug, id = %article.id, "article created");
    state.revalidator.article_changed(&[article.slug.as_str()]);
    Ok(Json(article))
}

pub async fn update_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> AppResult<Json<Article>> {
    tracing::info!(%slug, "update_article started");
    let Json(input) = payload?;
    let patch = input.into_patch()?;

    let article = state
        .store
        .update(&slug, patch, Utc::now())
        .await?
        .ok_or_else(AppError::article_not_found)?;
    tracing::info!(%slug, new_slug = %article.slug, "article updated");
    state.revalidator.article_changed(&[slug.as_str(), article.slug.as_str()]);
    Ok(Json(article))
}

pub async fn delete_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Article>> {
    tracing::info!(%slug, "delete_article started");
    let article = state
        .store
        .delete(&slug)
        .await?
        .ok_or_else(AppError::article_not_found)?;
    tracing::info!(%slug, "article deleted");
    state.revalidator.article_changed(&[slug.as_str()]);
    Ok(Json(article))
}
