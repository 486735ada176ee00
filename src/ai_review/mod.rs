use std::time::Duration;

use axum::http::StatusCode;
use reqwest::StatusCode as HttpStatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::error::ErrorStatus;
use crate::models::Submission;

pub const DEFAULT_AI_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_AI_REVIEW_MODEL: &str = "google/gemini-3-flash-preview";
pub const DEFAULT_AI_REVIEW_TIMEOUT_SECS: u64 = 45;
pub const FALLBACK_REVIEW_TEXT: &str = "Unable to generate review.";

const SYSTEM_PROMPT: &str = r#"You are the AI Chief Editor for Marine Notes Journal, a peer-reviewed open-access journal dedicated to marine conservation and ocean sciences.

Your job is to review a manuscript submission and provide a structured assessment. Evaluate the following:

1. **Title Quality**: Is it clear, specific, and appropriate for a scientific journal?
2. **Abstract Quality**: Is it well-structured, informative, and within acceptable length?
3. **Keywords Relevance**: Are the keywords appropriate for the topic?
4. **Manuscript Type Fit**: Does the described content match the selected manuscript type?
5. **Author Information**: Are author details complete?
6. **Overall Readiness**: Is this submission ready for peer review?

Provide your response in this exact format:
- Start with a brief overall assessment (2-3 sentences)
- Then list specific findings as bullet points with ✅ (pass), ⚠️ (warning), or ❌ (issue) prefixes
- End with a recommendation: "RECOMMENDATION: Ready for peer review" or "RECOMMENDATION: Revisions needed before peer review"

Be constructive, professional, and thorough but concise."#;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum AiReviewError {
    #[error("AI gateway API key is not configured")]
    NotConfigured,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("AI service credits exhausted.")]
    CreditsExhausted,
    #[error("AI gateway error: {detail}")]
    Unavailable { detail: String },
}

impl ErrorStatus for AiReviewError {
    fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            Self::NotConfigured | Self::Unavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotConfigured | Self::Unavailable { .. } => {
                "AI review service unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Manuscript metadata sent for review. Accepts the form's camelCase keys
/// and the table's snake_case ones.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewRequest {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    #[serde(alias = "manuscript_type")]
    pub manuscript_type: String,
    #[serde(alias = "all_authors")]
    pub authors: String,
    #[serde(alias = "cover_letter")]
    pub cover_letter: Option<String>,
}

impl From<&Submission> for ReviewRequest {
    fn from(submission: &Submission) -> Self {
        Self {
            title: submission.title.clone(),
            abstract_text: submission.abstract_text.clone(),
            keywords: submission.keywords.clone(),
            manuscript_type: submission.manuscript_type.clone(),
            authors: submission.all_authors.clone(),
            cover_letter: submission.cover_letter.clone(),
        }
    }
}

pub fn build_user_message(request: &ReviewRequest) -> String {
    let cover_letter = match request
        .cover_letter
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(letter) => format!("**Cover Letter:**\n{}", letter),
        None => "No cover letter provided.".to_string(),
    };

    format!(
        "Please review this manuscript submission:\n\n\
         **Title:** {}\n\
         **Manuscript Type:** {}\n\
         **Authors:** {}\n\
         **Keywords:** {}\n\n\
         **Abstract:**\n{}\n\n\
         {}",
        request.title,
        request.manuscript_type,
        request.authors,
        request.keywords,
        request.abstract_text,
        cover_letter
    )
}

/// `choices[0].message.content`, or the fallback text when the gateway
/// returned nothing usable.
pub fn extract_review_text(response: &Value) -> String {
    response
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(FALLBACK_REVIEW_TEXT)
        .to_string()
}

/// One chat-completion call. Failures are returned as-is, never retried.
pub async fn request_review(
    client: &reqwest::Client,
    config: &GatewayConfig,
    request: &ReviewRequest,
) -> Result<String, AiReviewError> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(AiReviewError::NotConfigured)?;

    let url = format!("{}/chat/completions", config.url.trim_end_matches('/'));
    let body = json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": build_user_message(request) },
        ],
    });

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .timeout(config.timeout)
        .json(&body)
        .send()
        .await
        .map_err(|error| AiReviewError::Unavailable {
            detail: error.to_string(),
        })?;

    let status = response.status();
    match status {
        HttpStatusCode::TOO_MANY_REQUESTS => return Err(AiReviewError::RateLimited),
        HttpStatusCode::PAYMENT_REQUIRED => return Err(AiReviewError::CreditsExhausted),
        _ => {}
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, "AI gateway error: {}", text);
        return Err(AiReviewError::Unavailable {
            detail: format!("gateway returned {}", status),
        });
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|error| AiReviewError::Unavailable {
            detail: format!("unreadable gateway response: {}", error),
        })?;

    tracing::info!(model = %config.model, title = %request.title, "AI review generated");
    Ok(extract_review_text(&payload))
}
