use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArticleSource {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetrics {
    #[serde(default)]
    pub citations: i64,
    #[serde(default)]
    pub downloads: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub altmetric_score: f64,
    #[serde(default)]
    pub social_shares: i64,
}

/// A published article as readers see it, whichever store it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub doi: String,
    pub title: String,
    pub authors: String,
    #[serde(default)]
    pub orcid_ids: Vec<String>,
    #[serde(rename = "type")]
    pub article_type: String,
    pub publication_date: NaiveDate,
    pub pdf_url: Option<String>,
    pub resolver_url: String,
    pub volume: String,
    pub issue: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ArticleMetrics>,
    #[serde(default)]
    pub source: ArticleSource,
}

#[derive(Debug, FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub doi: String,
    pub title: String,
    pub authors: String,
    pub orcid_ids_json: Option<String>,
    pub article_type: String,
    pub publication_date: NaiveDate,
    pub pdf_url: Option<String>,
    pub resolver_url: String,
    pub volume: String,
    pub issue: String,
    pub abstract_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        let orcid_ids = row
            .orcid_ids_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .unwrap_or_default();

        Self {
            id: row.id,
            doi: row.doi,
            title: row.title,
            authors: row.authors,
            orcid_ids,
            article_type: row.article_type,
            publication_date: row.publication_date,
            pdf_url: row.pdf_url,
            resolver_url: row.resolver_url,
            volume: row.volume,
            issue: row.issue,
            abstract_text: row.abstract_text,
            metrics: None,
            source: ArticleSource::Dynamic,
        }
    }
}

/// Editor-supplied article fields for `publish`, `update` and `upload-pdf`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleInput {
    pub id: Option<i64>,
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    pub orcid_ids: Vec<String>,
    #[serde(rename = "type")]
    pub article_type: String,
    pub publication_date: Option<String>,
    pub pdf_url: Option<String>,
    pub volume: String,
    pub issue: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub file_name: Option<String>,
    pub file_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationView {
    pub article: Article,
    pub citation: String,
}
