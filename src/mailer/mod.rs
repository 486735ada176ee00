use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

use crate::error::ErrorStatus;
use crate::models::Submission;

pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
pub const DEFAULT_MAIL_FROM: &str = "Marine Notes Journal <onboarding@resend.dev>";
pub const DEFAULT_EDITOR_EMAIL: &str = "editor@marinenotesjournal.com";

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
    pub editor_email: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email service not configured")]
    NotConfigured,
    #[error("Email delivery failed: {detail}")]
    Delivery { detail: String },
}

impl ErrorStatus for MailError {
    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn message(&self) -> String {
        match self {
            Self::NotConfigured => self.to_string(),
            Self::Delivery { .. } => "Failed to send email".to_string(),
        }
    }
}

/// Submission summary as posted by the submission forms. Field names from
/// every form variant are accepted.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SubmissionEmail {
    #[serde(alias = "submissionId")]
    pub submission_id: Option<String>,
    pub title: String,
    #[serde(alias = "manuscriptType")]
    pub manuscript_type: String,
    #[serde(alias = "correspondingAuthor")]
    pub corresponding_author_name: String,
    #[serde(alias = "email")]
    pub corresponding_author_email: String,
    #[serde(alias = "institution", alias = "affiliation")]
    pub corresponding_author_affiliation: String,
    #[serde(alias = "orcid")]
    pub corresponding_author_orcid: Option<String>,
    #[serde(alias = "authors", alias = "allAuthors")]
    pub all_authors: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    #[serde(alias = "coverLetter")]
    pub cover_letter: Option<String>,
    #[serde(alias = "filePaths")]
    pub file_paths: Vec<String>,
}

impl From<&Submission> for SubmissionEmail {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: Some(submission.id.clone()),
            title: submission.title.clone(),
            manuscript_type: submission.manuscript_type.clone(),
            corresponding_author_name: submission.corresponding_author_name.clone(),
            corresponding_author_email: submission.corresponding_author_email.clone(),
            corresponding_author_affiliation: submission.corresponding_author_affiliation.clone(),
            corresponding_author_orcid: submission.corresponding_author_orcid.clone(),
            all_authors: Some(submission.all_authors.clone()),
            abstract_text: submission.abstract_text.clone(),
            keywords: submission.keywords.clone(),
            cover_letter: submission.cover_letter.clone(),
            file_paths: submission.file_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(serialize_with = "serialize_base64")]
    pub content: Vec<u8>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn multiline_html(input: &str) -> String {
    escape_html(input).replace('\n', "<br>")
}

/// Stored paths look like `.../<timestamp>-<original name>`.
pub fn attachment_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.split_once('-') {
        Some((prefix, rest))
            if !rest.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest.to_string()
        }
        _ => file.to_string(),
    }
}

pub fn render_submission_email(submission: &SubmissionEmail) -> RenderedEmail {
    let subject = format!("New Manuscript Submission: {}", submission.title.trim());
    let orcid = submission
        .corresponding_author_orcid
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .unwrap_or("Not provided");

    let mut html = String::from(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">"#,
    );
    html.push_str(r#"<h1 style="color: #0066cc;">New Manuscript Submission</h1>"#);
    html.push_str("<h2>Manuscript Details</h2>");
    html.push_str(&format!("<p><strong>Title:</strong> {}</p>", escape_html(&submission.title)));
    html.push_str(&format!(
        "<p><strong>Type:</strong> {}</p>",
        escape_html(&submission.manuscript_type)
    ));
    if let Some(id) = &submission.submission_id {
        html.push_str(&format!("<p><strong>Submission ID:</strong> {}</p>", escape_html(id)));
    }
    html.push_str("<h2>Corresponding Author</h2>");
    html.push_str(&format!(
        "<p><strong>Name:</strong> {}</p>",
        escape_html(&submission.corresponding_author_name)
    ));
    html.push_str(&format!(
        "<p><strong>Email:</strong> {}</p>",
        escape_html(&submission.corresponding_author_email)
    ));
    html.push_str(&format!(
        "<p><strong>Affiliation:</strong> {}</p>",
        escape_html(&submission.corresponding_author_affiliation)
    ));
    html.push_str(&format!("<p><strong>ORCID:</strong> {}</p>", escape_html(orcid)));
    if let Some(authors) = submission.all_authors.as_deref().filter(|a| !a.trim().is_empty()) {
        html.push_str(&format!("<h2>All Authors</h2><p>{}</p>", multiline_html(authors)));
    }
    html.push_str(&format!(
        r#"<h2>Abstract</h2><p style="background-color: #f5f5f5; padding: 15px;">{}</p>"#,
        multiline_html(&submission.abstract_text)
    ));
    html.push_str(&format!(
        "<h2>Keywords</h2><p>{}</p>",
        escape_html(&submission.keywords)
    ));
    if let Some(letter) = submission.cover_letter.as_deref().filter(|c| !c.trim().is_empty()) {
        html.push_str(&format!("<h2>Cover Letter</h2><p>{}</p>", multiline_html(letter)));
    }
    html.push_str(
        r#"<p style="color: #666; font-size: 14px;">Please log in to the editorial dashboard to review the full submission and associated files.</p></div>"#,
    );

    let mut text = format!(
        "New Manuscript Submission\n\nTitle: {}\nType: {}\n",
        submission.title, submission.manuscript_type
    );
    if let Some(id) = &submission.submission_id {
        text.push_str(&format!("Submission ID: {}\n", id));
    }
    text.push_str(&format!(
        "\nCorresponding Author: {}\nEmail: {}\nAffiliation: {}\nORCID: {}\n",
        submission.corresponding_author_name,
        submission.corresponding_author_email,
        submission.corresponding_author_affiliation,
        orcid
    ));
    if let Some(authors) = submission.all_authors.as_deref().filter(|a| !a.trim().is_empty()) {
        text.push_str(&format!("\nAll Authors:\n{}\n", authors));
    }
    text.push_str(&format!(
        "\nAbstract:\n{}\n\nKeywords: {}\n",
        submission.abstract_text, submission.keywords
    ));
    if let Some(letter) = submission.cover_letter.as_deref().filter(|c| !c.trim().is_empty()) {
        text.push_str(&format!("\nCover Letter:\n{}\n", letter));
    }

    RenderedEmail {
        subject,
        html,
        text,
    }
}

#[derive(Debug, Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(client: reqwest::Client, config: MailConfig) -> Self {
        Self { client, config }
    }

    /// Sends a submission summary to the editorial inbox. Replies go to the
    /// corresponding author when one was given.
    pub async fn send_submission(
        &self,
        submission: &SubmissionEmail,
        attachments: Vec<Attachment>,
    ) -> Result<Value, MailError> {
        let rendered = render_submission_email(submission);
        let reply_to = Some(submission.corresponding_author_email.trim())
            .filter(|email| !email.is_empty());
        self.send(
            &[self.config.editor_email.as_str()],
            &rendered,
            reply_to,
            attachments,
        )
        .await
    }

    pub async fn send(
        &self,
        to: &[&str],
        email: &RenderedEmail,
        reply_to: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> Result<Value, MailError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(MailError::NotConfigured)?;

        let mut body = json!({
            "from": self.config.from,
            "to": to,
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });
        if let Some(reply_to) = reply_to {
            body["reply_to"] = json!(reply_to);
        }
        if !attachments.is_empty() {
            body["attachments"] = json!(attachments);
        }

        let url = format!("{}/emails", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| MailError::Delivery {
                detail: error.to_string(),
            })?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(MailError::Delivery {
                detail: format!("mail API returned {}: {}", status, payload),
            });
        }

        tracing::info!(
            subject = %email.subject,
            attachments = attachments.len(),
            "Email dispatched"
        );
        Ok(payload)
    }
}
