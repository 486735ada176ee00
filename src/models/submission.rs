use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::SubmissionReviewResponse;

pub const SUBMISSION_STATUS_PENDING: &str = "pending";
pub const SUBMISSION_STATUS_UNDER_REVIEW: &str = "under_review";
pub const SUBMISSION_STATUS_REVISIONS_REQUESTED: &str = "revisions_requested";
pub const SUBMISSION_STATUS_ACCEPTED: &str = "accepted";
pub const SUBMISSION_STATUS_REJECTED: &str = "rejected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    UnderReview,
    RevisionsRequested,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        Self::Pending,
        Self::UnderReview,
        Self::RevisionsRequested,
        Self::Accepted,
        Self::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => SUBMISSION_STATUS_PENDING,
            Self::UnderReview => SUBMISSION_STATUS_UNDER_REVIEW,
            Self::RevisionsRequested => SUBMISSION_STATUS_REVISIONS_REQUESTED,
            Self::Accepted => SUBMISSION_STATUS_ACCEPTED,
            Self::Rejected => SUBMISSION_STATUS_REJECTED,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == code)
    }

    /// Accepted and rejected submissions only move again through `unlock`.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Submission {
    pub id: String,
    pub user_id: Option<i64>,
    pub title: String,
    pub manuscript_type: String,
    pub abstract_text: String,
    pub keywords: String,
    pub corresponding_author_name: String,
    pub corresponding_author_email: String,
    pub corresponding_author_affiliation: String,
    pub corresponding_author_orcid: Option<String>,
    pub all_authors: String,
    pub cover_letter: Option<String>,
    pub file_paths_json: Option<String>,
    pub status: String,
    pub assigned_reviewer_id: Option<i64>,
    pub copyright_agreed: bool,
    pub copyright_signature: String,
    pub decision_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn status(&self) -> SubmissionStatus {
        SubmissionStatus::from_code(&self.status).unwrap_or(SubmissionStatus::Pending)
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.file_paths_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default()
    }
}

pub const SUBMISSION_SELECT_COLUMNS: &str = r#"
    SELECT
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
        CAST(file_paths AS CHAR) AS file_paths_json,
        status,
        assigned_reviewer_id,
        copyright_agreed,
        copyright_signature,
        decision_date,
        created_at,
        updated_at
    FROM manuscript_submissions
"#;

#[derive(Debug, Clone, Serialize)]
pub struct CorrespondingAuthor {
    pub name: String,
    pub email: String,
    pub affiliation: String,
    pub orcid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub title: String,
    pub manuscript_type: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub corresponding_author: CorrespondingAuthor,
    pub all_authors: String,
    pub cover_letter: Option<String>,
    pub file_paths: Vec<String>,
    pub status: SubmissionStatus,
    pub assigned_reviewer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub decision_date: Option<DateTime<Utc>>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        let status = submission.status();
        let file_paths = submission.file_paths();
        Self {
            id: submission.id,
            title: submission.title,
            manuscript_type: submission.manuscript_type,
            abstract_text: submission.abstract_text,
            keywords: submission.keywords,
            corresponding_author: CorrespondingAuthor {
                name: submission.corresponding_author_name,
                email: submission.corresponding_author_email,
                affiliation: submission.corresponding_author_affiliation,
                orcid: submission.corresponding_author_orcid,
            },
            all_authors: submission.all_authors,
            cover_letter: submission.cover_letter,
            file_paths,
            status,
            assigned_reviewer_id: submission.assigned_reviewer_id,
            created_at: submission.created_at,
            decision_date: submission.decision_date,
        }
    }
}

/// What an anonymous tracker may see.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrackedSubmission {
    pub id: String,
    pub title: String,
    pub manuscript_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub corresponding_author_name: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionWithReviews {
    #[serde(flatten)]
    pub submission: SubmissionResponse,
    pub reviews: Vec<SubmissionReviewResponse>,
}

/// Fields collected from the submission form before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSubmission {
    pub title: String,
    pub manuscript_type: String,
    pub abstract_text: String,
    pub keywords: String,
    pub corresponding_author_name: String,
    pub corresponding_author_email: String,
    pub corresponding_author_affiliation: String,
    pub corresponding_author_orcid: Option<String>,
    pub all_authors: String,
    pub cover_letter: Option<String>,
    pub copyright_original: bool,
    pub copyright_approved: bool,
    pub copyright_transfer: bool,
    pub copyright_cc: bool,
    pub copyright_signature: String,
}
