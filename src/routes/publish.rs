use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::AppState;
use crate::catalog;
use crate::doi::{self, parse_doi};
use crate::error::{ApiError, api_error, database_error, domain_error};
use crate::models::{Article, ArticleInput, User};
use crate::routes::auth::extract_editor_user;
use crate::storage::{article_pdf_path, decode_pdf};
use crate::validation::{sanitize_file_name, validate_article};

/// Body of the `publish-article` function. A legacy `passcode` field is
/// accepted and ignored; the bearer token decides access.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub action: String,
    #[serde(default)]
    pub article: Option<ArticleInput>,
}

pub async fn publish_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let editor = extract_editor_user(&state, &headers).await?;
    tracing::debug!(action = %request.action, editor = %editor.username, "publish-article");

    let article = request.article.unwrap_or_default();
    let body = match request.action.as_str() {
        "get-next-doi" => next_doi(&state).await?,
        "upload-pdf" => upload_pdf(&state, &article).await?,
        "list-articles" => list_articles(&state).await?,
        "publish" => publish(&state, &editor, &article).await?,
        "update" => update(&state, &article).await?,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Unknown action")),
    };
    Ok(Json(body))
}

async fn next_doi(state: &AppState) -> Result<Value, ApiError> {
    let parts = doi::suggest_next_doi(&state.pool, &state.catalog, Utc::now().year())
        .await
        .map_err(database_error)?;
    Ok(json!({ "doi": parts.to_string(), "nextNum": parts.sequence }))
}

async fn upload_pdf(state: &AppState, article: &ArticleInput) -> Result<Value, ApiError> {
    let data = article
        .file_data
        .as_deref()
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "File data is required"))?;
    let bytes = decode_pdf(data, state.config.max_pdf_bytes).map_err(domain_error)?;

    let path = match article.doi.as_deref().and_then(parse_doi) {
        Some(parts) => article_pdf_path(parts.year, &parts.to_string(), &article.title),
        None => {
            let name = article
                .file_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "File name is required"))?;
            format!("{}/{}", Utc::now().year(), sanitize_file_name(name.trim()))
        }
    };

    let url = state
        .store()
        .put(&path, &bytes)
        .await
        .map_err(domain_error)?;
    tracing::info!(path = %path, size = bytes.len(), "Uploaded article PDF");
    Ok(json!({ "url": url }))
}

/// The whole catalog, bundled entries first. Each entry carries its
/// `source`; bundled ones have non-positive ids and cannot be updated.
async fn list_articles(state: &AppState) -> Result<Value, ApiError> {
    let dynamic = catalog::fetch_dynamic_articles(&state.pool)
        .await
        .map_err(database_error)?;
    Ok(editor_listing(state.catalog.articles(), dynamic))
}

fn editor_listing(bundled: &[Article], dynamic: Vec<Article>) -> Value {
    json!({ "articles": catalog::merge_articles(bundled, dynamic) })
}

async fn publish(state: &AppState, editor: &User, input: &ArticleInput) -> Result<Value, ApiError> {
    let validated = validate_article(input, Utc::now().date_naive()).map_err(domain_error)?;

    let article = match validated.doi.as_deref() {
        Some(raw_doi) => {
            doi::publish_with_explicit_doi(
                &state.pool,
                &state.catalog,
                &validated,
                raw_doi,
                &state.config.public_base_url,
                Some(editor.id),
            )
            .await
        }
        None => {
            doi::publish_with_allocated_doi(
                &state.pool,
                &state.catalog,
                &validated,
                Utc::now().year(),
                &state.config.public_base_url,
                Some(editor.id),
            )
            .await
        }
    }
    .map_err(domain_error)?;

    tracing::info!(
        doi = %article.doi,
        article_id = article.id,
        editor_id = editor.id,
        "Article published"
    );
    Ok(json!({ "success": true, "article": article }))
}

async fn update(state: &AppState, input: &ArticleInput) -> Result<Value, ApiError> {
    let id = editable_article_id(input)?;
    let validated = validate_article(input, Utc::now().date_naive()).map_err(domain_error)?;

    let article = catalog::update_article(&state.pool, id, &validated)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Article not found"))?;

    tracing::info!(doi = %article.doi, article_id = id, "Article updated");
    Ok(json!({ "success": true, "article": article }))
}

/// Bundled articles carry non-positive ids and are read-only.
fn editable_article_id(input: &ArticleInput) -> Result<i64, ApiError> {
    match input.id {
        None => Err(api_error(StatusCode::BAD_REQUEST, "Article id is required")),
        Some(id) if id <= 0 => Err(api_error(
            StatusCode::BAD_REQUEST,
            "Bundled articles cannot be edited",
        )),
        Some(id) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;
    use crate::app::testing::{body_json, send};

    #[test]
    fn passcode_is_accepted_and_ignored() {
        let request: PublishRequest = serde_json::from_value(json!({
            "passcode": "legacy",
            "action": "publish",
            "article": {"title": "T", "type": "Notes", "orcidIds": ["0000-0001-9181-0292"]}
        }))
        .unwrap();
        assert_eq!(request.action, "publish");
        let article = request.article.unwrap();
        assert_eq!(article.article_type, "Notes");
        assert_eq!(article.orcid_ids.len(), 1);
    }

    #[test]
    fn article_is_optional() {
        let request: PublishRequest =
            serde_json::from_value(json!({"action": "get-next-doi"})).unwrap();
        assert!(request.article.is_none());
    }

    #[test]
    fn editor_listing_includes_bundled_articles_first() {
        let catalog = crate::catalog::Catalog::bundled().unwrap();
        let dynamic = vec![crate::catalog::sample_article(1, "MNJ-2026-004", "1", "2")];

        let listing = editor_listing(catalog.articles(), dynamic);
        let articles = listing["articles"].as_array().unwrap();
        assert_eq!(articles.len(), 4);
        assert_eq!(articles[0]["doi"], "MNJ-2026-001");
        assert_eq!(articles[0]["source"], "static");
        assert!(articles[0]["id"].as_i64().unwrap() < 0);
        assert_eq!(articles[3]["source"], "dynamic");
        assert_eq!(articles[3]["id"], 1);
    }

    #[test]
    fn bundled_article_ids_are_not_editable() {
        let bundled = ArticleInput {
            id: Some(-2),
            ..ArticleInput::default()
        };
        let (status, _) = editable_article_id(&bundled).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = ArticleInput::default();
        assert!(editable_article_id(&missing).is_err());

        let row = ArticleInput {
            id: Some(7),
            ..ArticleInput::default()
        };
        assert_eq!(editable_article_id(&row).unwrap(), 7);
    }

    #[tokio::test]
    async fn anonymous_callers_are_rejected() {
        let response = send(
            Request::post("/api/functions/publish-article")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"action":"get-next-doi"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Missing authorization header");
    }
}
