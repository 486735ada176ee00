pub mod store;

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use thiserror::Error;

use crate::error::{ErrorStatus, classify_database_error};
use crate::models::{
    REVIEW_SELECT_COLUMNS, ReviewAction, SUBMISSION_SELECT_COLUMNS, Submission, SubmissionReview,
    SubmissionStatus, User, UserRole,
};

pub use store::{
    count_by_status, create_submission, fetch_review, fetch_reviews, fetch_reviews_for,
    fetch_submission, fetch_user_submissions, list_submissions, track_submission,
};

const EDITOR_ACTIONS: [ReviewAction; 5] = [
    ReviewAction::Note,
    ReviewAction::AssignReviewer,
    ReviewAction::RequestRevision,
    ReviewAction::Accept,
    ReviewAction::Reject,
];

pub const DECIDED_BY_OTHER_MESSAGE: &str =
    "Another editor has already made a decision on this submission.";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Submission not found")]
    NotFound,
    #[error("Submission is finalized. Unlock it before taking further action.")]
    Finalized,
    #[error("Another editor has already made a decision on this submission.")]
    DecidedByOther,
    #[error("A reason is required to unlock a submission")]
    UnlockReasonRequired,
    #[error("Only accepted or rejected submissions can be unlocked")]
    NotFinalized,
    #[error("Submission is not awaiting revisions")]
    NotAwaitingRevision,
    #[error("You can only resubmit your own manuscripts")]
    NotOwner,
    #[error("Assigned reviewer must be an editor")]
    InvalidReviewer,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorStatus for WorkflowError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Finalized
            | Self::DecidedByOther
            | Self::NotFinalized
            | Self::NotAwaitingRevision => StatusCode::CONFLICT,
            Self::UnlockReasonRequired | Self::InvalidReviewer => StatusCode::BAD_REQUEST,
            Self::NotOwner => StatusCode::FORBIDDEN,
            Self::Database(error) => classify_database_error(error).0,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Database(error) => classify_database_error(error).1.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionDate {
    Set,
    Clear,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next_status: SubmissionStatus,
    pub decision_date: DecisionDate,
    pub comment: Option<String>,
}

/// What a given editor may do with a submission right now.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionPanel {
    pub status: SubmissionStatus,
    pub actions: Vec<ReviewAction>,
    pub locked_reason: Option<String>,
}

impl ActionPanel {
    pub fn for_editor(
        status: SubmissionStatus,
        reviews: &[SubmissionReview],
        editor_id: i64,
    ) -> Self {
        if status.is_final() {
            return Self {
                status,
                actions: vec![ReviewAction::Unlock],
                locked_reason: Some(format!(
                    "This submission has been {}. No further actions available.",
                    status.as_str()
                )),
            };
        }

        if has_decision_by_other(reviews, editor_id) {
            return Self {
                status,
                actions: Vec::new(),
                locked_reason: Some(DECIDED_BY_OTHER_MESSAGE.to_string()),
            };
        }

        Self {
            status,
            actions: EDITOR_ACTIONS.to_vec(),
            locked_reason: None,
        }
    }
}

/// True when anyone other than `editor_id` has ever recorded an accept or
/// reject in the audit log, including decisions later unlocked.
pub fn has_decision_by_other(reviews: &[SubmissionReview], editor_id: i64) -> bool {
    reviews.iter().any(|review| {
        review.action().is_some_and(ReviewAction::is_decision)
            && review.reviewer_id != Some(editor_id)
    })
}

pub fn plan_transition(
    status: SubmissionStatus,
    action: ReviewAction,
    comment: Option<&str>,
    reviews: &[SubmissionReview],
    editor_id: i64,
) -> Result<Transition, WorkflowError> {
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());

    if status.is_final() {
        if action != ReviewAction::Unlock {
            return Err(WorkflowError::Finalized);
        }
        let reason = comment.ok_or(WorkflowError::UnlockReasonRequired)?;
        return Ok(Transition {
            next_status: SubmissionStatus::UnderReview,
            decision_date: DecisionDate::Clear,
            comment: Some(format!("Submission unlocked. Reason: {}", reason)),
        });
    }

    if action == ReviewAction::Unlock {
        return Err(WorkflowError::NotFinalized);
    }
    if has_decision_by_other(reviews, editor_id) {
        return Err(WorkflowError::DecidedByOther);
    }

    let (next_status, decision_date) = match action {
        ReviewAction::Note => (status, DecisionDate::Keep),
        ReviewAction::AssignReviewer if status == SubmissionStatus::Pending => {
            (SubmissionStatus::UnderReview, DecisionDate::Keep)
        }
        ReviewAction::AssignReviewer => (status, DecisionDate::Keep),
        ReviewAction::RequestRevision => (SubmissionStatus::RevisionsRequested, DecisionDate::Keep),
        ReviewAction::Accept => (SubmissionStatus::Accepted, DecisionDate::Set),
        ReviewAction::Reject => (SubmissionStatus::Rejected, DecisionDate::Set),
        ReviewAction::Unlock => return Err(WorkflowError::NotFinalized),
    };

    Ok(Transition {
        next_status,
        decision_date,
        comment: comment.map(str::to_string),
    })
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub submission: Submission,
    pub review: SubmissionReview,
}

/// Records one editor action. The audit row and the status change commit
/// together or not at all.
pub async fn apply_editor_action(
    pool: &MySqlPool,
    submission_id: &str,
    editor: &User,
    action: ReviewAction,
    comment: Option<&str>,
    reviewer_id: Option<i64>,
) -> Result<ActionOutcome, WorkflowError> {
    let mut tx = pool.begin().await?;

    let submission = sqlx::query_as::<_, Submission>(&format!(
        "{} WHERE id = ? FOR UPDATE",
        SUBMISSION_SELECT_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(WorkflowError::NotFound)?;

    let reviews = sqlx::query_as::<_, SubmissionReview>(&format!(
        "{} WHERE r.submission_id = ? ORDER BY r.created_at ASC, r.id ASC",
        REVIEW_SELECT_COLUMNS
    ))
    .bind(submission_id)
    .fetch_all(&mut *tx)
    .await?;

    let current = submission.status();
    let mut transition = plan_transition(current, action, comment, &reviews, editor.id)?;

    let mut assigned_id = None;
    if action == ReviewAction::AssignReviewer {
        let target_id = reviewer_id.unwrap_or(editor.id);
        let target: Option<(i64, String, String)> = sqlx::query_as(
            "SELECT id, role, COALESCE(display_name, username) FROM users WHERE id = ?",
        )
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (id, role, name) = target.ok_or(WorkflowError::InvalidReviewer)?;
        if !matches!(
            UserRole::from_code(&role),
            Some(UserRole::Editor | UserRole::Admin)
        ) {
            return Err(WorkflowError::InvalidReviewer);
        }
        transition
            .comment
            .get_or_insert_with(|| format!("Assigned reviewer: {}", name));
        assigned_id = Some(id);
    }

    let now = Utc::now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO submission_reviews (submission_id, reviewer_id, action, comment, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission_id)
    .bind(editor.id)
    .bind(action.as_str())
    .bind(&transition.comment)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let mut update = QueryBuilder::<MySql>::new("UPDATE manuscript_submissions SET updated_at = ");
    update.push_bind(now);
    if transition.next_status != current {
        update.push(", status = ");
        update.push_bind(transition.next_status.as_str());
    }
    match transition.decision_date {
        DecisionDate::Set => {
            update.push(", decision_date = ");
            update.push_bind(now);
        }
        DecisionDate::Clear => {
            update.push(", decision_date = NULL");
        }
        DecisionDate::Keep => {}
    }
    if let Some(id) = assigned_id {
        update.push(", assigned_reviewer_id = ");
        update.push_bind(id);
    }
    update.push(" WHERE id = ");
    update.push_bind(submission_id);
    update.build().execute(&mut *tx).await?;

    tx.commit().await?;

    tracing::info!(
        submission_id,
        editor_id = editor.id,
        action = action.as_str(),
        from = current.as_str(),
        to = transition.next_status.as_str(),
        "Recorded editor action"
    );

    let submission = fetch_submission(pool, submission_id)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let review = fetch_review(pool, inserted.last_insert_id() as i64)
        .await?
        .ok_or(WorkflowError::NotFound)?;

    Ok(ActionOutcome { submission, review })
}

/// Only the owning author may resubmit, and only after revisions were requested.
pub fn plan_resubmission(submission: &Submission, author_id: i64) -> Result<(), WorkflowError> {
    if submission.user_id != Some(author_id) {
        return Err(WorkflowError::NotOwner);
    }
    if submission.status() != SubmissionStatus::RevisionsRequested {
        return Err(WorkflowError::NotAwaitingRevision);
    }
    Ok(())
}

pub fn resubmission_comment(response: Option<&str>) -> String {
    match response.map(str::trim).filter(|r| !r.is_empty()) {
        Some(response) => format!("Revised manuscript submitted. Author response: {}", response),
        None => "Revised manuscript submitted.".to_string(),
    }
}

/// Moves a submission from revisions_requested back to under_review,
/// appending the revised files and logging a note from the author.
pub async fn resubmit(
    pool: &MySqlPool,
    submission_id: &str,
    author: &User,
    new_file_paths: &[String],
    response: Option<&str>,
) -> Result<Submission, WorkflowError> {
    let mut tx = pool.begin().await?;

    let submission = sqlx::query_as::<_, Submission>(&format!(
        "{} WHERE id = ? FOR UPDATE",
        SUBMISSION_SELECT_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(WorkflowError::NotFound)?;

    plan_resubmission(&submission, author.id)?;

    let mut file_paths = submission.file_paths();
    file_paths.extend(new_file_paths.iter().cloned());
    let file_paths_json = serde_json::to_string(&file_paths).unwrap_or_else(|_| "[]".to_string());
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE manuscript_submissions
        SET status = ?, file_paths = CAST(? AS JSON), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(SubmissionStatus::UnderReview.as_str())
    .bind(file_paths_json)
    .bind(now)
    .bind(submission_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO submission_reviews (submission_id, reviewer_id, action, comment, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission_id)
    .bind(author.id)
    .bind(ReviewAction::Note.as_str())
    .bind(resubmission_comment(response))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        submission_id,
        author_id = author.id,
        added_files = new_file_paths.len(),
        "Revised manuscript resubmitted"
    );

    fetch_submission(pool, submission_id)
        .await?
        .ok_or(WorkflowError::NotFound)
}

#[cfg(test)]
pub(crate) fn review_row(id: i64, reviewer_id: i64, action: ReviewAction) -> SubmissionReview {
    SubmissionReview {
        id,
        submission_id: "sub-1".to_string(),
        reviewer_id: Some(reviewer_id),
        reviewer_name: None,
        action: action.as_str().to_string(),
        comment: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_user, test_pool};

    const EDITOR_A: i64 = 1;
    const EDITOR_B: i64 = 2;

    #[test]
    fn accept_sets_decision_date_and_finalizes() {
        let transition = plan_transition(
            SubmissionStatus::UnderReview,
            ReviewAction::Accept,
            None,
            &[],
            EDITOR_A,
        )
        .unwrap();
        assert_eq!(transition.next_status, SubmissionStatus::Accepted);
        assert_eq!(transition.decision_date, DecisionDate::Set);
        assert!(transition.next_status.is_final());
    }

    #[test]
    fn pending_submissions_move_on_assignment_and_decisions() {
        let assign = plan_transition(
            SubmissionStatus::Pending,
            ReviewAction::AssignReviewer,
            Some("Assigned reviewer: Dr. B"),
            &[],
            EDITOR_A,
        )
        .unwrap();
        assert_eq!(assign.next_status, SubmissionStatus::UnderReview);

        let reject =
            plan_transition(SubmissionStatus::Pending, ReviewAction::Reject, None, &[], EDITOR_A)
                .unwrap();
        assert_eq!(reject.next_status, SubmissionStatus::Rejected);

        let revise = plan_transition(
            SubmissionStatus::UnderReview,
            ReviewAction::RequestRevision,
            Some("Please add methods"),
            &[],
            EDITOR_A,
        )
        .unwrap();
        assert_eq!(revise.next_status, SubmissionStatus::RevisionsRequested);
        assert_eq!(revise.decision_date, DecisionDate::Keep);
    }

    #[test]
    fn notes_keep_status_and_may_be_empty() {
        let transition = plan_transition(
            SubmissionStatus::RevisionsRequested,
            ReviewAction::Note,
            Some("   "),
            &[],
            EDITOR_A,
        )
        .unwrap();
        assert_eq!(transition.next_status, SubmissionStatus::RevisionsRequested);
        assert_eq!(transition.comment, None);
    }

    #[test]
    fn finalized_submissions_only_accept_unlock() {
        for status in [SubmissionStatus::Accepted, SubmissionStatus::Rejected] {
            for action in EDITOR_ACTIONS {
                assert!(matches!(
                    plan_transition(status, action, Some("comment"), &[], EDITOR_A),
                    Err(WorkflowError::Finalized)
                ));
            }
        }
    }

    #[test]
    fn unlock_requires_reason_and_clears_decision_date() {
        assert!(matches!(
            plan_transition(SubmissionStatus::Accepted, ReviewAction::Unlock, Some("  "), &[], EDITOR_A),
            Err(WorkflowError::UnlockReasonRequired)
        ));
        assert!(matches!(
            plan_transition(SubmissionStatus::Accepted, ReviewAction::Unlock, None, &[], EDITOR_A),
            Err(WorkflowError::UnlockReasonRequired)
        ));

        let transition = plan_transition(
            SubmissionStatus::Rejected,
            ReviewAction::Unlock,
            Some(" Wrong manuscript "),
            &[],
            EDITOR_A,
        )
        .unwrap();
        assert_eq!(transition.next_status, SubmissionStatus::UnderReview);
        assert_eq!(transition.decision_date, DecisionDate::Clear);
        assert_eq!(
            transition.comment.as_deref(),
            Some("Submission unlocked. Reason: Wrong manuscript")
        );

        assert!(matches!(
            plan_transition(SubmissionStatus::UnderReview, ReviewAction::Unlock, Some("x"), &[], EDITOR_A),
            Err(WorkflowError::NotFinalized)
        ));
    }

    #[test]
    fn second_editor_is_blocked_after_first_decision() {
        let log = vec![
            review_row(1, EDITOR_A, ReviewAction::Note),
            review_row(2, EDITOR_A, ReviewAction::Accept),
        ];

        let panel_b = ActionPanel::for_editor(SubmissionStatus::Accepted, &log, EDITOR_B);
        assert_eq!(panel_b.actions, vec![ReviewAction::Unlock]);
        assert!(!panel_b.actions.contains(&ReviewAction::Accept));
        assert!(!panel_b.actions.contains(&ReviewAction::Reject));

        // After an unlock the earlier decision still blocks other editors.
        let mut unlocked = log.clone();
        unlocked.push(review_row(3, EDITOR_A, ReviewAction::Unlock));
        let panel_b = ActionPanel::for_editor(SubmissionStatus::UnderReview, &unlocked, EDITOR_B);
        assert!(panel_b.actions.is_empty());
        assert_eq!(panel_b.locked_reason.as_deref(), Some(DECIDED_BY_OTHER_MESSAGE));
        assert!(matches!(
            plan_transition(SubmissionStatus::UnderReview, ReviewAction::Reject, None, &unlocked, EDITOR_B),
            Err(WorkflowError::DecidedByOther)
        ));

        let panel_a = ActionPanel::for_editor(SubmissionStatus::UnderReview, &unlocked, EDITOR_A);
        assert!(panel_a.actions.contains(&ReviewAction::Reject));
    }

    #[test]
    fn open_submission_offers_every_editor_action() {
        let log = vec![review_row(1, EDITOR_B, ReviewAction::RequestRevision)];
        let panel = ActionPanel::for_editor(SubmissionStatus::UnderReview, &log, EDITOR_A);
        assert_eq!(panel.actions, EDITOR_ACTIONS.to_vec());
        assert_eq!(panel.locked_reason, None);
    }

    #[test]
    fn workflow_errors_map_to_statuses() {
        assert_eq!(WorkflowError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(WorkflowError::Finalized.status(), StatusCode::CONFLICT);
        assert_eq!(WorkflowError::DecidedByOther.status(), StatusCode::CONFLICT);
        assert_eq!(
            WorkflowError::UnlockReasonRequired.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(WorkflowError::NotOwner.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn resubmission_comment_includes_author_response() {
        assert_eq!(resubmission_comment(None), "Revised manuscript submitted.");
        assert_eq!(
            resubmission_comment(Some(" Added a map ")),
            "Revised manuscript submitted. Author response: Added a map"
        );
    }

    async fn seeded_submission(pool: &MySqlPool, author: &User) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let files = vec![format!("submissions/{}/1-draft.pdf", author.id)];
        create_submission(
            pool,
            &id,
            Some(author.id),
            &crate::validation::sample_submission(),
            &files,
        )
        .await
        .unwrap();
        id
    }

    fn count_actions(reviews: &[SubmissionReview], action: ReviewAction) -> usize {
        reviews.iter().filter(|r| r.action() == Some(action)).count()
    }

    #[tokio::test]
    #[ignore] // Requires MySQL at TEST_DATABASE_URL
    async fn accept_records_one_audit_row_and_sets_decision_date() {
        let pool = test_pool().await;
        let author = insert_user(&pool, UserRole::Author).await;
        let editor = insert_user(&pool, UserRole::Editor).await;
        let id = seeded_submission(&pool, &author).await;

        let outcome = apply_editor_action(&pool, &id, &editor, ReviewAction::Accept, None, None)
            .await
            .unwrap();
        assert_eq!(outcome.submission.status(), SubmissionStatus::Accepted);
        assert!(outcome.submission.decision_date.is_some());
        assert_eq!(outcome.review.action(), Some(ReviewAction::Accept));
        assert_eq!(outcome.review.reviewer_id, Some(editor.id));

        let reviews = fetch_reviews(&pool, &id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(count_actions(&reviews, ReviewAction::Accept), 1);

        // A finalized submission refuses further actions and writes nothing.
        let refused =
            apply_editor_action(&pool, &id, &editor, ReviewAction::Note, Some("late"), None).await;
        assert!(matches!(refused, Err(WorkflowError::Finalized)));
        assert_eq!(fetch_reviews(&pool, &id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires MySQL at TEST_DATABASE_URL
    async fn unlock_clears_decision_date_and_blocks_other_editors() {
        let pool = test_pool().await;
        let author = insert_user(&pool, UserRole::Author).await;
        let editor_a = insert_user(&pool, UserRole::Editor).await;
        let editor_b = insert_user(&pool, UserRole::Editor).await;
        let id = seeded_submission(&pool, &author).await;

        apply_editor_action(&pool, &id, &editor_a, ReviewAction::Reject, None, None)
            .await
            .unwrap();
        let unlocked = apply_editor_action(
            &pool,
            &id,
            &editor_b,
            ReviewAction::Unlock,
            Some("Wrong file reviewed"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(unlocked.submission.status(), SubmissionStatus::UnderReview);
        assert_eq!(unlocked.submission.decision_date, None);
        assert_eq!(
            unlocked.review.comment.as_deref(),
            Some("Submission unlocked. Reason: Wrong file reviewed")
        );

        let blocked =
            apply_editor_action(&pool, &id, &editor_b, ReviewAction::Accept, None, None).await;
        assert!(matches!(blocked, Err(WorkflowError::DecidedByOther)));

        let reviews = fetch_reviews(&pool, &id).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(count_actions(&reviews, ReviewAction::Reject), 1);
        assert_eq!(count_actions(&reviews, ReviewAction::Unlock), 1);
    }

    #[tokio::test]
    #[ignore] // Requires MySQL at TEST_DATABASE_URL
    async fn assignment_and_resubmission_round_trip() {
        let pool = test_pool().await;
        let author = insert_user(&pool, UserRole::Author).await;
        let editor = insert_user(&pool, UserRole::Editor).await;
        let id = seeded_submission(&pool, &author).await;

        let not_an_editor = apply_editor_action(
            &pool,
            &id,
            &editor,
            ReviewAction::AssignReviewer,
            None,
            Some(author.id),
        )
        .await;
        assert!(matches!(not_an_editor, Err(WorkflowError::InvalidReviewer)));

        let assigned =
            apply_editor_action(&pool, &id, &editor, ReviewAction::AssignReviewer, None, None)
                .await
                .unwrap();
        assert_eq!(assigned.submission.status(), SubmissionStatus::UnderReview);
        assert_eq!(assigned.submission.assigned_reviewer_id, Some(editor.id));

        let early = resubmit(&pool, &id, &author, &["x.pdf".to_string()], None).await;
        assert!(matches!(early, Err(WorkflowError::NotAwaitingRevision)));

        apply_editor_action(
            &pool,
            &id,
            &editor,
            ReviewAction::RequestRevision,
            Some("Add a site map"),
            None,
        )
        .await
        .unwrap();

        let revised = format!("submissions/{}/2-revised.pdf", author.id);
        let submission = resubmit(
            &pool,
            &id,
            &author,
            std::slice::from_ref(&revised),
            Some("Map added"),
        )
        .await
        .unwrap();
        assert_eq!(submission.status(), SubmissionStatus::UnderReview);
        let files = submission.file_paths();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], revised);

        let reviews = fetch_reviews(&pool, &id).await.unwrap();
        let last = reviews.last().unwrap();
        assert_eq!(last.action(), Some(ReviewAction::Note));
        assert_eq!(last.reviewer_id, Some(author.id));
        assert_eq!(
            last.comment.as_deref(),
            Some("Revised manuscript submitted. Author response: Map added")
        );
    }
}
