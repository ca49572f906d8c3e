use axum::Json;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use shelf_common::{Article, NewArticle, PageRequest, parse_article_url};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    page: u32,
    limit: u32,
}

/// `GET /api/articles?page=&limit=`
pub async fn list_articles(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let Query(params) = params.map_err(|r| ApiError::BadRequest(r.body_text()))?;
    let window = PageRequest::new(params.page, params.limit)?;
    let articles = state.store.list(window).await?;
    Ok(Json(articles))
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    #[serde(default)]
    url: String,
}

/// `POST /api/articles` with form field `url`.
///
/// The page is fetched and summarized before anything is written, so a
/// failed fetch leaves the store untouched.
pub async fn create_article(
    State(state): State<AppState>,
    form: Result<Form<CreateArticle>, FormRejection>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let Form(form) = form.map_err(|r| ApiError::BadRequest(r.body_text()))?;
    let url = parse_article_url(&form.url)?;

    let metadata = shelf_web::summarize(state.fetcher.as_ref(), &url).await?;
    let article = state.store.insert(&NewArticle { url, metadata }).await?;

    info!(id = article.id, url = %article.url, "articles.create.done");
    Ok((StatusCode::CREATED, Json(article)))
}
