use axum::{
    Router,
    extract::{Json, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use serde_json::json;

use crate::ai_review::{ReviewRequest, request_review};
use crate::app::AppState;
use crate::error::{ApiError, api_error, database_error, domain_error};
use crate::mailer::{Attachment, SubmissionEmail, attachment_name};
use crate::models::NewSubmission;
use crate::routes::auth::extract_editor_user;
use crate::routes::publish::publish_article;
use crate::routes::submissions::read_submission_form;
use crate::storage::StorageError;
use crate::workflow;

pub fn functions_routes() -> Router<AppState> {
    Router::new()
        .route("/publish-article", post(publish_article))
        .route("/ai-review", post(ai_review))
        .route("/track-submission", post(track_submission))
        .route("/notify-manuscript-submission", post(notify_manuscript_submission))
        .route("/send-submission-email", post(send_submission_email))
        .route("/send-manuscript-email", post(send_manuscript_email))
}

async fn ai_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    extract_editor_user(&state, &headers).await?;
    let review = request_review(&state.http, &state.config.ai, &request)
        .await
        .map_err(domain_error)?;
    Ok(Json(json!({ "review": review })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TrackRequest {
    #[serde(rename = "submissionId", alias = "submission_id")]
    pub submission_id: String,
    pub email: String,
}

async fn track_submission(
    State(state): State<AppState>,
    Json(request): Json<TrackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let submission_id = request.submission_id.trim();
    let email = request.email.trim();
    if submission_id.is_empty() || email.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Submission ID and email are required",
        ));
    }

    let submission = workflow::track_submission(&state.pool, submission_id, email)
        .await
        .map_err(database_error)?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "Submission not found or email does not match",
            )
        })?;

    Ok(Json(json!({ "submission": submission })))
}

async fn notify_manuscript_submission(
    State(state): State<AppState>,
    Json(submission): Json<SubmissionEmail>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .mailer()
        .send_submission(&submission, Vec::new())
        .await
        .map_err(domain_error)?;
    Ok(Json(response))
}

/// Attaches each stored file it can read. Missing files are skipped.
async fn send_submission_email(
    State(state): State<AppState>,
    Json(submission): Json<SubmissionEmail>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store();
    let mut attachments = Vec::with_capacity(submission.file_paths.len());

    for path in &submission.file_paths {
        match store.get(path).await {
            Ok(content) => attachments.push(Attachment {
                filename: attachment_name(path),
                content,
            }),
            Err(StorageError::NotFound | StorageError::InvalidPath) => {
                tracing::warn!(path = %path, "Skipping attachment that could not be found");
            }
            Err(error) => return Err(domain_error(error)),
        }
    }

    let response = state
        .mailer()
        .send_submission(&submission, attachments)
        .await
        .map_err(domain_error)?;
    Ok(Json(response))
}

fn email_from_form(fields: NewSubmission, submission_id: Option<String>) -> SubmissionEmail {
    SubmissionEmail {
        submission_id,
        title: fields.title,
        manuscript_type: fields.manuscript_type,
        corresponding_author_name: fields.corresponding_author_name,
        corresponding_author_email: fields.corresponding_author_email,
        corresponding_author_affiliation: fields.corresponding_author_affiliation,
        corresponding_author_orcid: fields.corresponding_author_orcid,
        all_authors: Some(fields.all_authors),
        abstract_text: fields.abstract_text,
        keywords: fields.keywords,
        cover_letter: fields.cover_letter,
        file_paths: Vec::new(),
    }
}

async fn send_manuscript_email(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_submission_form(multipart, state.config.max_pdf_bytes).await?;
    let attachments: Vec<Attachment> = form
        .files
        .into_iter()
        .map(|file| Attachment {
            filename: file.name,
            content: file.bytes,
        })
        .collect();
    tracing::debug!(attachments = attachments.len(), "Sending manuscript email");

    let email = email_from_form(form.fields, form.submission_id);
    let response = state
        .mailer()
        .send_submission(&email, attachments)
        .await
        .map_err(domain_error)?;
    Ok(Json(response))
}
