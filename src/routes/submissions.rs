use std::collections::HashMap;

use axum::{
    Router,
    extract::{Json, Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{ApiError, api_error, database_error, domain_error, internal_error};
use crate::mailer::SubmissionEmail;
use crate::models::{
    NewSubmission, Submission, SubmissionResponse, SubmissionReviewResponse, SubmissionWithReviews,
};
use crate::routes::auth::{extract_current_user, extract_optional_user};
use crate::storage::{StorageError, submission_file_path};
use crate::validation::validate_submission;
use crate::workflow::{self, plan_resubmission};

pub fn submissions_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_submission))
        .route("/mine", get(my_submissions))
        .route("/{submission_id}/resubmit", post(resubmit))
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A submission form as posted: text fields, checkbox flags and attachments.
#[derive(Debug, Default)]
pub struct SubmissionForm {
    pub fields: NewSubmission,
    pub submission_id: Option<String>,
    pub response: Option<String>,
    pub files: Vec<UploadedFile>,
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

/// Text parts are accepted under the form's camelCase names and the
/// table's snake_case ones. Unknown names are ignored.
pub fn apply_form_field(form: &mut SubmissionForm, name: &str, value: String) {
    let fields = &mut form.fields;
    match name {
        "title" => fields.title = value,
        "manuscriptType" | "manuscript_type" => fields.manuscript_type = value,
        "abstract" => fields.abstract_text = value,
        "keywords" => fields.keywords = value,
        "correspondingAuthor" | "corresponding_author_name" => {
            fields.corresponding_author_name = value
        }
        "email" | "corresponding_author_email" => fields.corresponding_author_email = value,
        "institution" | "affiliation" | "corresponding_author_affiliation" => {
            fields.corresponding_author_affiliation = value
        }
        "orcid" | "corresponding_author_orcid" => fields.corresponding_author_orcid = Some(value),
        "authors" | "all_authors" => fields.all_authors = value,
        "coverLetter" | "cover_letter" => fields.cover_letter = Some(value),
        "originalWork" | "copyright_original" => fields.copyright_original = is_checked(&value),
        "noConflict" | "copyright_approved" => fields.copyright_approved = is_checked(&value),
        "transferRights" | "copyright_transfer" => fields.copyright_transfer = is_checked(&value),
        "creativeCommons" | "copyright_cc" => fields.copyright_cc = is_checked(&value),
        "authorSignature" | "copyright_signature" => fields.copyright_signature = value,
        "submissionId" | "submission_id" => form.submission_id = Some(value),
        "response" => form.response = Some(value),
        other => tracing::debug!(field = other, "Ignoring unknown form field"),
    }
}

fn is_file_field(name: &str) -> bool {
    matches!(name, "files" | "files[]" | "file")
}

/// Keeps the rejection's own status, so an oversized body is a 413.
fn multipart_error(error: MultipartError) -> ApiError {
    let status = error.status();
    tracing::debug!(status = %status, error = %error, "Rejected multipart body");
    api_error(status, error.body_text())
}

pub async fn read_submission_form(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let name = field.name().unwrap_or_default().to_string();

        if is_file_field(&name) {
            let Some(file_name) = field.file_name().map(ToString::to_string) else {
                continue;
            };
            let data = field
                .bytes()
                .await
                .map_err(multipart_error)?;
            if data.is_empty() {
                continue;
            }
            if data.len() > max_file_bytes {
                return Err(domain_error(StorageError::TooLarge {
                    limit: max_file_bytes,
                }));
            }
            form.files.push(UploadedFile {
                name: file_name,
                bytes: data.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(multipart_error)?;
            apply_form_field(&mut form, &name, value);
        }
    }

    Ok(form)
}

/// Stores each file under the owner's submissions folder and returns the
/// object paths in upload order.
pub async fn store_submission_files(
    state: &AppState,
    user_id: Option<i64>,
    files: &[UploadedFile],
) -> Result<Vec<String>, ApiError> {
    let store = state.store();
    let timestamp = Utc::now().timestamp_millis();
    let mut paths: Vec<String> = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        let mut path = submission_file_path(user_id, timestamp, &file.name);
        if paths.contains(&path) {
            path = submission_file_path(user_id, timestamp, &format!("{}-{}", index + 1, file.name));
        }
        store.put(&path, &file.bytes).await.map_err(domain_error)?;
        paths.push(path);
    }

    Ok(paths)
}

/// Best-effort removal of objects written for a submission whose row was
/// never saved.
pub async fn discard_submission_files(state: &AppState, paths: &[String]) {
    let store = state.store();
    for path in paths {
        if let Err(error) = store.remove(path).await {
            tracing::warn!(path = %path, error = %error, "Could not remove orphaned upload");
        }
    }
}

fn spawn_submission_notification(state: &AppState, submission: &Submission) {
    if state.config.mail.api_key.is_none() {
        tracing::debug!(submission_id = %submission.id, "Mail API not configured; skipping notification");
        return;
    }

    let mailer = state.mailer();
    let email = SubmissionEmail::from(submission);
    tokio::spawn(async move {
        if let Err(error) = mailer.send_submission(&email, Vec::new()).await {
            tracing::warn!(
                submission_id = email.submission_id.as_deref().unwrap_or_default(),
                error = %error,
                "Submission notification failed"
            );
        }
    });
}

async fn create_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_optional_user(&state, &headers).await?;
    let form = read_submission_form(multipart, state.config.max_pdf_bytes).await?;
    let validated = validate_submission(&form.fields, form.files.len()).map_err(domain_error)?;

    let user_id = user.as_ref().map(|u| u.id);
    let file_paths = store_submission_files(&state, user_id, &form.files).await?;

    let submission_id = Uuid::new_v4().to_string();
    if let Err(error) =
        workflow::create_submission(&state.pool, &submission_id, user_id, &validated, &file_paths)
            .await
    {
        discard_submission_files(&state, &file_paths).await;
        return Err(database_error(error));
    }

    let submission = workflow::fetch_submission(&state.pool, &submission_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| internal_error("created submission vanished"))?;

    tracing::info!(
        submission_id = %submission.id,
        user_id = ?user_id,
        files = file_paths.len(),
        "Manuscript submitted"
    );
    spawn_submission_notification(&state, &submission);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "submission": SubmissionResponse::from(submission) })),
    ))
}

async fn my_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = extract_current_user(&state, &headers).await?;
    let submissions = workflow::fetch_user_submissions(&state.pool, user.id)
        .await
        .map_err(database_error)?;

    let ids: Vec<String> = submissions.iter().map(|s| s.id.clone()).collect();
    let reviews = workflow::fetch_reviews_for(&state.pool, &ids)
        .await
        .map_err(database_error)?;

    let mut reviews_by_submission: HashMap<String, Vec<SubmissionReviewResponse>> = HashMap::new();
    for review in reviews {
        reviews_by_submission
            .entry(review.submission_id.clone())
            .or_default()
            .push(SubmissionReviewResponse::from(review));
    }

    let submissions: Vec<SubmissionWithReviews> = submissions
        .into_iter()
        .map(|submission| {
            let reviews = reviews_by_submission
                .remove(&submission.id)
                .unwrap_or_default();
            SubmissionWithReviews {
                submission: SubmissionResponse::from(submission),
                reviews,
            }
        })
        .collect();

    Ok(Json(json!({ "submissions": submissions })))
}

async fn resubmit(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let author = extract_current_user(&state, &headers).await?;

    let existing = workflow::fetch_submission(&state.pool, &submission_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Submission not found"))?;
    plan_resubmission(&existing, author.id).map_err(domain_error)?;

    let form = read_submission_form(multipart, state.config.max_pdf_bytes).await?;
    if form.files.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "At least one revised file is required",
        ));
    }
    let file_paths = store_submission_files(&state, Some(author.id), &form.files).await?;

    let submission = match workflow::resubmit(
        &state.pool,
        &submission_id,
        &author,
        &file_paths,
        form.response.as_deref(),
    )
    .await
    {
        Ok(submission) => submission,
        Err(error) => {
            discard_submission_files(&state, &file_paths).await;
            return Err(domain_error(error));
        }
    };

    Ok(Json(json!({ "submission": SubmissionResponse::from(submission) })))
}
