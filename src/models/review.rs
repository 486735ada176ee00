use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Note,
    RequestRevision,
    Accept,
    Reject,
    AssignReviewer,
    Unlock,
}

impl ReviewAction {
    pub const ALL: [ReviewAction; 6] = [
        Self::Note,
        Self::RequestRevision,
        Self::Accept,
        Self::Reject,
        Self::AssignReviewer,
        Self::Unlock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::RequestRevision => "request_revision",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::AssignReviewer => "assign_reviewer",
            Self::Unlock => "unlock",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == code)
    }

    pub fn is_decision(self) -> bool {
        matches!(self, Self::Accept | Self::Reject)
    }
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionReview {
    pub id: i64,
    pub submission_id: String,
    pub reviewer_id: Option<i64>,
    pub reviewer_name: Option<String>,
    pub action: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionReview {
    pub fn action(&self) -> Option<ReviewAction> {
        ReviewAction::from_code(&self.action)
    }
}

pub const REVIEW_SELECT_COLUMNS: &str = r#"
    SELECT
        r.id,
        r.submission_id,
        r.reviewer_id,
        COALESCE(u.display_name, u.username) AS reviewer_name,
        r.action,
        r.comment,
        r.created_at
    FROM submission_reviews r
    LEFT JOIN users u ON u.id = r.reviewer_id
"#;

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReviewResponse {
    pub id: i64,
    pub submission_id: String,
    pub reviewer_id: Option<i64>,
    pub reviewer_name: Option<String>,
    pub action: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionReview> for SubmissionReviewResponse {
    fn from(review: SubmissionReview) -> Self {
        Self {
            id: review.id,
            submission_id: review.submission_id,
            reviewer_id: review.reviewer_id,
            reviewer_name: review.reviewer_name,
            action: review.action,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditorActionRequest {
    pub action: ReviewAction,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reviewer_id: Option<i64>,
}
