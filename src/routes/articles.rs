use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::catalog::{self, format_citation, group_archive, merge_articles};
use crate::error::{ApiError, api_error, database_error, internal_error};
use crate::metrics::{MetricKey, export_csv, rank, report_file_name, summarize};
use crate::models::{Article, CitationView};

pub fn articles_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles))
        .route("/archive", get(archive))
        .route("/metrics", get(citation_metrics))
        .route("/metrics.csv", get(citation_report))
}

pub fn doi_routes() -> Router<AppState> {
    Router::new().route("/{*doi}", get(resolve_doi))
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MetricsQuery {
    #[serde(default)]
    pub sort: MetricKey,
    pub search: Option<String>,
}

/// Bundled catalog merged with published rows. When the table cannot be
/// read, readers still get the bundled articles.
pub async fn load_merged_articles(state: &AppState) -> Vec<Article> {
    let dynamic = match catalog::fetch_dynamic_articles(&state.pool).await {
        Ok(articles) => articles,
        Err(error) => {
            tracing::warn!(error = %error, "Falling back to the bundled catalog");
            Vec::new()
        }
    };
    merge_articles(state.catalog.articles(), dynamic)
}

async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let merged = load_merged_articles(&state).await;
    let articles = match query.search.as_deref() {
        Some(term) => catalog::search(&merged, term),
        None => merged,
    };
    Ok(Json(json!({ "articles": articles })))
}

async fn archive(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let merged = load_merged_articles(&state).await;
    Ok(Json(json!({ "volumes": group_archive(&merged) })))
}

async fn citation_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let merged = load_merged_articles(&state).await;
    let summary = summarize(&merged);
    let articles = rank(&merged, query.sort, query.search.as_deref());
    Ok(Json(json!({
        "summary": summary,
        "sort": query.sort,
        "articles": articles,
    })))
}

async fn citation_report(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let merged = load_merged_articles(&state).await;
    let ranked = rank(&merged, query.sort, query.search.as_deref());
    let body = export_csv(&ranked).map_err(internal_error)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report_file_name(Utc::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Bundled articles answer first; the table is only consulted on a miss.
async fn resolve_doi(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doi = catalog::normalize_doi_query(&raw);
    if doi.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "DOI is required"));
    }

    let article = match state.catalog.find(&doi) {
        Some(article) => article.clone(),
        None => catalog::fetch_by_doi(&state.pool, &doi)
            .await
            .map_err(database_error)?
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Article not found"))?,
    };

    let citation = format_citation(&article);
    Ok(Json(CitationView { article, citation }))
}
