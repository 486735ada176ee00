use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::ai_review::{ReviewRequest, request_review};
use crate::app::AppState;
use crate::error::{ApiError, api_error, database_error, domain_error};
use crate::models::{
    EditorActionRequest, ReviewAction, SubmissionResponse, SubmissionReviewResponse,
    SubmissionStatus,
};
use crate::routes::auth::extract_editor_user;
use crate::workflow::{self, ActionPanel};

pub fn editor_routes() -> Router<AppState> {
    Router::new()
        .route("/submissions", get(list_submissions))
        .route("/submissions/{submission_id}", get(get_submission))
        .route("/submissions/{submission_id}/actions", post(apply_action))
        .route("/submissions/{submission_id}/ai-review", post(ai_review_submission))
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusFilter {
    pub status: Option<String>,
}

/// `None` for a missing or `all` filter.
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<SubmissionStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("all") => Ok(None),
        Some(code) => SubmissionStatus::from_code(code)
            .map(Some)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid status filter")),
    }
}

async fn list_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, ApiError> {
    extract_editor_user(&state, &headers).await?;
    let status = parse_status_filter(filter.status.as_deref())?;

    let submissions = workflow::list_submissions(&state.pool, status)
        .await
        .map_err(database_error)?;
    let counts = workflow::count_by_status(&state.pool)
        .await
        .map_err(database_error)?;

    let submissions: Vec<SubmissionResponse> = submissions
        .into_iter()
        .map(SubmissionResponse::from)
        .collect();
    Ok(Json(json!({ "submissions": submissions, "counts": counts })))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let editor = extract_editor_user(&state, &headers).await?;

    let submission = workflow::fetch_submission(&state.pool, &submission_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Submission not found"))?;
    let reviews = workflow::fetch_reviews(&state.pool, &submission_id)
        .await
        .map_err(database_error)?;

    let action_panel = ActionPanel::for_editor(submission.status(), &reviews, editor.id);
    let reviews: Vec<SubmissionReviewResponse> = reviews
        .into_iter()
        .map(SubmissionReviewResponse::from)
        .collect();

    Ok(Json(json!({
        "submission": SubmissionResponse::from(submission),
        "reviews": reviews,
        "action_panel": action_panel,
    })))
}

async fn apply_action(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<EditorActionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let editor = extract_editor_user(&state, &headers).await?;

    let outcome = workflow::apply_editor_action(
        &state.pool,
        &submission_id,
        &editor,
        input.action,
        input.comment.as_deref(),
        input.reviewer_id,
    )
    .await
    .map_err(domain_error)?;

    Ok(Json(json!({
        "submission": SubmissionResponse::from(outcome.submission),
        "review": SubmissionReviewResponse::from(outcome.review),
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct AiReviewQuery {
    #[serde(default)]
    pub save: bool,
}

/// Runs the AI review on a stored submission. With `save=true` the text is
/// recorded as a note from the calling editor.
async fn ai_review_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<AiReviewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let editor = extract_editor_user(&state, &headers).await?;

    let submission = workflow::fetch_submission(&state.pool, &submission_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Submission not found"))?;

    let review_text = request_review(
        &state.http,
        &state.config.ai,
        &ReviewRequest::from(&submission),
    )
    .await
    .map_err(domain_error)?;

    let saved = if query.save {
        let outcome = workflow::apply_editor_action(
            &state.pool,
            &submission_id,
            &editor,
            ReviewAction::Note,
            Some(&review_text),
            None,
        )
        .await
        .map_err(domain_error)?;
        Some(SubmissionReviewResponse::from(outcome.review))
    } else {
        None
    };

    Ok(Json(json!({ "review": review_text, "saved": saved })))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;
    use crate::app::testing::send;

    #[test]
    fn status_filter_accepts_codes_and_all() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("all")).unwrap(), None);
        assert_eq!(parse_status_filter(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("revisions_requested")).unwrap(),
            Some(SubmissionStatus::RevisionsRequested)
        );
        assert_eq!(
            parse_status_filter(Some("archived")).unwrap_err().0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn action_body_uses_snake_case_codes() {
        let input: EditorActionRequest = serde_json::from_value(json!({
            "action": "request_revision",
            "comment": "Please expand the methods."
        }))
        .unwrap();
        assert_eq!(input.action, ReviewAction::RequestRevision);
        assert!(input.reviewer_id.is_none());
    }

    #[tokio::test]
    async fn editor_routes_require_a_token() {
        for uri in [
            "/api/editor/submissions",
            "/api/editor/submissions/3f1c2a7e-0000-4000-8000-000000000000",
        ] {
            let response = send(Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
