use std::fmt;

use axum::http::StatusCode;
use sqlx::MySqlPool;
use thiserror::Error;

use crate::catalog::{self, Catalog};
use crate::error::{ErrorStatus, classify_database_error, is_unique_violation};
use crate::models::Article;
use crate::validation::ValidatedArticle;

pub const DOI_PREFIX: &str = "MNJ";
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoiParts {
    pub year: i32,
    pub sequence: u32,
}

impl fmt::Display for DoiParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:03}", DOI_PREFIX, self.year, self.sequence)
    }
}

pub fn format_doi(year: i32, sequence: u32) -> String {
    DoiParts { year, sequence }.to_string()
}

/// Parses `MNJ-<year>-<sequence>`, case-insensitively on the prefix.
/// Suffixes longer than three digits may not start with `0`, so every
/// accepted DOI formats back to itself.
pub fn parse_doi(raw: &str) -> Option<DoiParts> {
    let mut parts = raw.trim().splitn(3, '-');
    let prefix = parts.next()?;
    if !prefix.eq_ignore_ascii_case(DOI_PREFIX) {
        return None;
    }
    let year = parts.next()?;
    let sequence = parts.next()?;
    if year.len() != 4 || sequence.len() < 3 {
        return None;
    }
    if !year.bytes().chain(sequence.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    if sequence.len() > 3 && sequence.starts_with('0') {
        return None;
    }
    Some(DoiParts {
        year: year.parse().ok()?,
        sequence: sequence.parse().ok()?,
    })
}

pub fn resolver_url(public_base_url: &str, doi: &str) -> String {
    format!("{}/doi/{}", public_base_url.trim_end_matches('/'), doi)
}

/// The sequence after whichever is higher: the largest stored suffix or the
/// largest suffix the bundled catalog already occupies.
pub fn next_sequence(max_dynamic: Option<u32>, static_floor: u32) -> u32 {
    max_dynamic.unwrap_or(0).max(static_floor) + 1
}

#[derive(Debug, Error)]
pub enum DoiError {
    #[error("DOI already exists")]
    Conflict(String),
    #[error("Could not allocate a DOI after {0} attempts")]
    Exhausted(u32),
    #[error("Invalid DOI format")]
    Invalid,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorStatus for DoiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Conflict(_) | Self::Exhausted(_) => StatusCode::CONFLICT,
            Self::Invalid => StatusCode::BAD_REQUEST,
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

pub async fn max_dynamic_sequence(pool: &MySqlPool, year: i32) -> Result<Option<u32>, sqlx::Error> {
    let max: Option<i64> = sqlx::query_scalar(
        "SELECT CAST(MAX(doi_sequence) AS SIGNED) FROM articles WHERE doi_year = ?",
    )
    .bind(year)
    .fetch_one(pool)
    .await?;

    Ok(max.and_then(|value| u32::try_from(value).ok()))
}

/// Preview of the DOI the next `publish` would receive. Not a reservation.
pub async fn suggest_next_doi(
    pool: &MySqlPool,
    catalog: &Catalog,
    year: i32,
) -> Result<DoiParts, sqlx::Error> {
    let max_dynamic = max_dynamic_sequence(pool, year).await?;
    let static_floor = catalog.max_sequence_for_year(year).unwrap_or(0);
    Ok(DoiParts {
        year,
        sequence: next_sequence(max_dynamic, static_floor),
    })
}

pub async fn publish_with_allocated_doi(
    pool: &MySqlPool,
    catalog: &Catalog,
    article: &ValidatedArticle,
    year: i32,
    public_base_url: &str,
    created_by: Option<i64>,
) -> Result<Article, DoiError> {
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let doi = suggest_next_doi(pool, catalog, year).await?;
        let resolver = resolver_url(public_base_url, &doi.to_string());

        match catalog::insert_article(pool, article, &doi, &resolver, created_by).await {
            Ok(result) => {
                tracing::info!(doi = %doi, attempt, "Issued DOI");
                return fetch_inserted(pool, result.last_insert_id()).await;
            }
            Err(error) if is_unique_violation(&error) => {
                tracing::warn!(
                    doi = %doi,
                    attempt,
                    max_attempts = MAX_ALLOCATION_ATTEMPTS,
                    "DOI allocation collided with a concurrent publish. Retrying..."
                );
            }
            Err(error) => return Err(DoiError::Database(error)),
        }
    }

    Err(DoiError::Exhausted(MAX_ALLOCATION_ATTEMPTS))
}

/// Inserts under a DOI the editor chose. Collisions are never renumbered.
pub async fn publish_with_explicit_doi(
    pool: &MySqlPool,
    catalog: &Catalog,
    article: &ValidatedArticle,
    raw_doi: &str,
    public_base_url: &str,
    created_by: Option<i64>,
) -> Result<Article, DoiError> {
    let doi = parse_doi(raw_doi).ok_or(DoiError::Invalid)?;
    let doi_text = doi.to_string();
    if catalog.contains_doi(&doi_text) {
        return Err(DoiError::Conflict(doi_text));
    }

    let resolver = resolver_url(public_base_url, &doi_text);
    match catalog::insert_article(pool, article, &doi, &resolver, created_by).await {
        Ok(result) => {
            tracing::info!(doi = %doi, "Published article under editor-supplied DOI");
            fetch_inserted(pool, result.last_insert_id()).await
        }
        Err(error) if is_unique_violation(&error) => Err(DoiError::Conflict(doi_text)),
        Err(error) => Err(DoiError::Database(error)),
    }
}

async fn fetch_inserted(pool: &MySqlPool, id: u64) -> Result<Article, DoiError> {
    catalog::fetch_by_id(pool, id as i64)
        .await?
        .ok_or(DoiError::Database(sqlx::Error::RowNotFound))
}
