use chrono::Utc;
use sqlx::{MySqlPool, mysql::MySqlQueryResult};

use crate::doi::DoiParts;
use crate::models::{Article, ArticleRow};
use crate::validation::ValidatedArticle;

const ARTICLE_SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        doi,
        title,
        authors,
        CAST(orcid_ids AS CHAR) AS orcid_ids_json,
        article_type,
        publication_date,
        pdf_url,
        resolver_url,
        volume,
        issue,
        abstract_text,
        created_at,
        updated_at
    FROM articles
"#;

pub async fn fetch_dynamic_articles(pool: &MySqlPool) -> Result<Vec<Article>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ArticleRow>(&format!(
        "{} ORDER BY id ASC",
        ARTICLE_SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Article::from).collect())
}

pub async fn fetch_by_doi(pool: &MySqlPool, doi: &str) -> Result<Option<Article>, sqlx::Error> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        "{} WHERE doi = ?",
        ARTICLE_SELECT_COLUMNS
    ))
    .bind(doi)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Article::from))
}

pub async fn fetch_by_id(pool: &MySqlPool, id: i64) -> Result<Option<Article>, sqlx::Error> {
    let row = sqlx::query_as::<_, ArticleRow>(&format!(
        "{} WHERE id = ?",
        ARTICLE_SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Article::from))
}

/// Single insert attempt. A duplicate DOI or sequence surfaces as a
/// unique-violation for the caller to handle.
pub async fn insert_article(
    pool: &MySqlPool,
    article: &ValidatedArticle,
    doi: &DoiParts,
    resolver_url: &str,
    created_by: Option<i64>,
) -> Result<MySqlQueryResult, sqlx::Error> {
    let orcid_ids_json =
        serde_json::to_string(&article.orcid_ids).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO articles (
            doi,
            doi_year,
            doi_sequence,
            title,
            authors,
            orcid_ids,
            article_type,
            publication_date,
            pdf_url,
            resolver_url,
            volume,
            issue,
            abstract_text,
            created_by,
            created_at
        ) VALUES (?, ?, ?, ?, ?, CAST(? AS JSON), ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doi.to_string())
    .bind(doi.year)
    .bind(doi.sequence)
    .bind(&article.title)
    .bind(&article.authors)
    .bind(orcid_ids_json)
    .bind(&article.article_type)
    .bind(article.publication_date)
    .bind(&article.pdf_url)
    .bind(resolver_url)
    .bind(&article.volume)
    .bind(&article.issue)
    .bind(&article.abstract_text)
    .bind(created_by)
    .bind(Utc::now())
    .execute(pool)
    .await
}

/// Rewrites the editable fields of a dynamic article. The DOI never changes.
pub async fn update_article(
    pool: &MySqlPool,
    id: i64,
    article: &ValidatedArticle,
) -> Result<Option<Article>, sqlx::Error> {
    let orcid_ids_json =
        serde_json::to_string(&article.orcid_ids).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        UPDATE articles
        SET title = ?,
            authors = ?,
            orcid_ids = CAST(? AS JSON),
            article_type = ?,
            publication_date = ?,
            pdf_url = ?,
            volume = ?,
            issue = ?,
            abstract_text = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&article.title)
    .bind(&article.authors)
    .bind(orcid_ids_json)
    .bind(&article.article_type)
    .bind(article.publication_date)
    .bind(&article.pdf_url)
    .bind(&article.volume)
    .bind(&article.issue)
    .bind(&article.abstract_text)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    fetch_by_id(pool, id).await
}
