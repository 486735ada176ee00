use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::models::{
    NewSubmission, REVIEW_SELECT_COLUMNS, SUBMISSION_SELECT_COLUMNS, Submission, SubmissionReview,
    SubmissionStatus, TrackedSubmission,
};

pub async fn fetch_submission(pool: &MySqlPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("{} WHERE id = ?", SUBMISSION_SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_submissions(
    pool: &MySqlPool,
    status: Option<SubmissionStatus>,
) -> Result<Vec<Submission>, sqlx::Error> {
    let mut query_builder = QueryBuilder::<MySql>::new(SUBMISSION_SELECT_COLUMNS);
    if let Some(status) = status {
        query_builder.push(" WHERE status = ");
        query_builder.push_bind(status.as_str());
    }
    query_builder.push(" ORDER BY created_at DESC");

    query_builder
        .build_query_as::<Submission>()
        .fetch_all(pool)
        .await
}

pub async fn fetch_user_submissions(
    pool: &MySqlPool,
    user_id: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC",
        SUBMISSION_SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Per-status totals; statuses with no submissions report zero.
pub async fn count_by_status(pool: &MySqlPool) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, CAST(COUNT(*) AS SIGNED) FROM manuscript_submissions GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut counts: BTreeMap<String, i64> = SubmissionStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    let mut total = 0;
    for (status, count) in rows {
        total += count;
        counts.insert(status, count);
    }
    counts.insert("all".to_string(), total);
    Ok(counts)
}

pub async fn fetch_review(pool: &MySqlPool, id: i64) -> Result<Option<SubmissionReview>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionReview>(&format!("{} WHERE r.id = ?", REVIEW_SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_reviews(
    pool: &MySqlPool,
    submission_id: &str,
) -> Result<Vec<SubmissionReview>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionReview>(&format!(
        "{} WHERE r.submission_id = ? ORDER BY r.created_at ASC, r.id ASC",
        REVIEW_SELECT_COLUMNS
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

/// Audit rows for several submissions at once, oldest first.
pub async fn fetch_reviews_for(
    pool: &MySqlPool,
    submission_ids: &[String],
) -> Result<Vec<SubmissionReview>, sqlx::Error> {
    if submission_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_builder = QueryBuilder::<MySql>::new(REVIEW_SELECT_COLUMNS);
    query_builder.push(" WHERE r.submission_id IN (");
    let mut separated = query_builder.separated(", ");
    for id in submission_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(") ORDER BY r.created_at ASC, r.id ASC");

    query_builder
        .build_query_as::<SubmissionReview>()
        .fetch_all(pool)
        .await
}

pub async fn create_submission(
    pool: &MySqlPool,
    id: &str,
    user_id: Option<i64>,
    submission: &NewSubmission,
    file_paths: &[String],
) -> Result<(), sqlx::Error> {
    let file_paths_json = serde_json::to_string(file_paths).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO manuscript_submissions (
            id,
            user_id,
            title,
            manuscript_type,
            abstract_text,
            keywords,
            corresponding_author_name,
            corresponding_author_email,
            corresponding_author_affiliation,
            corresponding_author_orcid,
            all_authors,
            cover_letter,
            file_paths,
            status,
            copyright_agreed,
            copyright_signature,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS JSON), ?, TRUE, ?, ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&submission.title)
    .bind(&submission.manuscript_type)
    .bind(&submission.abstract_text)
    .bind(&submission.keywords)
    .bind(&submission.corresponding_author_name)
    .bind(&submission.corresponding_author_email)
    .bind(&submission.corresponding_author_affiliation)
    .bind(&submission.corresponding_author_orcid)
    .bind(&submission.all_authors)
    .bind(&submission.cover_letter)
    .bind(file_paths_json)
    .bind(SubmissionStatus::Pending.as_str())
    .bind(&submission.copyright_signature)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Looks a submission up by id and corresponding-author email, ignoring
/// case and surrounding whitespace in the email.
pub async fn track_submission(
    pool: &MySqlPool,
    id: &str,
    email: &str,
) -> Result<Option<TrackedSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TrackedSubmission>(
        r#"
        SELECT id, title, manuscript_type, status, created_at, corresponding_author_name
        FROM manuscript_submissions
        WHERE id = ?
          AND LOWER(TRIM(corresponding_author_email)) = LOWER(TRIM(?))
        "#,
    )
    .bind(id.trim())
    .bind(email)
    .fetch_optional(pool)
    .await
}
