pub mod store;

use std::{collections::HashSet, sync::LazyLock};

use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::doi::parse_doi;
use crate::models::{Article, ArticleSource};

pub use store::{fetch_by_doi, fetch_by_id, fetch_dynamic_articles, insert_article, update_article};

pub const JOURNAL_NAME: &str = "Marine Notes Journal";

static RESOLVER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?:/+[^/]+(?:/.*)?/doi/").expect("valid resolver prefix pattern")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    articles: Vec<Article>,
}

/// The articles bundled with the binary. Never modified at runtime.
///
/// Bundled ids are negated on load so they never collide with `articles`
/// rows, whose AUTO_INCREMENT ids are positive.
#[derive(Debug, Clone)]
pub struct Catalog {
    articles: Vec<Article>,
}

impl Catalog {
    pub fn bundled() -> Result<Self, serde_json::Error> {
        Self::from_json(include_str!("../../data/articles.json"))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let articles = file
            .articles
            .into_iter()
            .map(|mut article| {
                article.id = -article.id.abs();
                article.source = ArticleSource::Static;
                article
            })
            .collect();
        Ok(Self { articles })
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn contains_doi(&self, doi: &str) -> bool {
        self.articles
            .iter()
            .any(|article| article.doi.eq_ignore_ascii_case(doi.trim()))
    }

    pub fn find(&self, raw: &str) -> Option<&Article> {
        find_by_doi(&self.articles, raw)
    }

    /// Highest DOI suffix the bundled articles occupy for `year`.
    pub fn max_sequence_for_year(&self, year: i32) -> Option<u32> {
        self.articles
            .iter()
            .filter_map(|article| parse_doi(&article.doi))
            .filter(|parts| parts.year == year)
            .map(|parts| parts.sequence)
            .max()
    }
}

/// Static articles first, then dynamic rows whose DOI is not already listed.
pub fn merge_articles(static_articles: &[Article], dynamic: Vec<Article>) -> Vec<Article> {
    let mut seen: HashSet<String> = static_articles
        .iter()
        .map(|article| article.doi.to_ascii_uppercase())
        .collect();

    let mut merged = static_articles.to_vec();
    for article in dynamic {
        if seen.insert(article.doi.to_ascii_uppercase()) {
            merged.push(article);
        } else {
            tracing::debug!(doi = %article.doi, "Skipping dynamic article shadowed by an earlier entry");
        }
    }
    merged
}

/// Accepts a bare DOI or a resolver link such as `https://host/doi/MNJ-2026-001`.
pub fn normalize_doi_query(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = RESOLVER_PREFIX.replace(trimmed, "");
    without_prefix
        .trim_start_matches("doi:")
        .trim_matches('/')
        .trim()
        .to_string()
}

pub fn find_by_doi<'a>(articles: &'a [Article], raw: &str) -> Option<&'a Article> {
    let doi = normalize_doi_query(raw);
    if doi.is_empty() {
        return None;
    }
    articles
        .iter()
        .find(|article| article.doi.eq_ignore_ascii_case(&doi))
}

pub fn matches_search(article: &Article, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        article.title.as_str(),
        article.authors.as_str(),
        article.abstract_text.as_str(),
        article.doi.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

pub fn search(articles: &[Article], term: &str) -> Vec<Article> {
    articles
        .iter()
        .filter(|article| matches_search(article, term))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveIssue {
    pub issue: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveVolume {
    pub volume: String,
    pub year: Option<i32>,
    pub issues: Vec<ArchiveIssue>,
}

/// Groups articles by volume and issue, newest first. Articles inside an
/// issue keep their merged order.
pub fn group_archive(articles: &[Article]) -> Vec<ArchiveVolume> {
    let mut volumes: Vec<ArchiveVolume> = Vec::new();

    for article in articles {
        let volume = match volumes.iter_mut().find(|v| v.volume == article.volume) {
            Some(volume) => volume,
            None => {
                volumes.push(ArchiveVolume {
                    volume: article.volume.clone(),
                    year: None,
                    issues: Vec::new(),
                });
                let last = volumes.len() - 1;
                &mut volumes[last]
            }
        };

        let year = article.publication_date.year();
        volume.year = Some(volume.year.map_or(year, |existing| existing.min(year)));

        match volume.issues.iter_mut().find(|i| i.issue == article.issue) {
            Some(issue) => issue.articles.push(article.clone()),
            None => volume.issues.push(ArchiveIssue {
                issue: article.issue.clone(),
                articles: vec![article.clone()],
            }),
        }
    }

    volumes.sort_by_key(|v| std::cmp::Reverse(numeric_key(&v.volume)));
    for volume in &mut volumes {
        volume.issues.sort_by_key(|i| std::cmp::Reverse(numeric_key(&i.issue)));
    }
    volumes
}

fn numeric_key(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

/// APA-style reference line shown on the resolver page.
pub fn format_citation(article: &Article) -> String {
    format!(
        "{} ({}). {}. {}, {}({}). {}",
        article.authors,
        article.publication_date.year(),
        article.title,
        JOURNAL_NAME,
        article.volume,
        article.issue,
        article.doi
    )
}

#[cfg(test)]
pub(crate) fn sample_article(id: i64, doi: &str, volume: &str, issue: &str) -> Article {
    Article {
        id,
        doi: doi.to_string(),
        title: format!("Observation note {id}"),
        authors: "Christos Taklis".to_string(),
        orcid_ids: Vec::new(),
        article_type: "Notes".to_string(),
        publication_date: chrono::NaiveDate::from_ymd_opt(2026, 2, 12).unwrap(),
        pdf_url: None,
        resolver_url: format!("https://www.marinenotesjournal.com/doi/{doi}"),
        volume: volume.to_string(),
        issue: issue.to_string(),
        abstract_text: "Sightings of cetaceans in the gulf.".to_string(),
        metrics: None,
        source: ArticleSource::Dynamic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(catalog.articles().len(), 3);
        assert!(catalog.contains_doi("mnj-2026-003"));
        assert_eq!(catalog.max_sequence_for_year(2026), Some(3));
        assert_eq!(catalog.max_sequence_for_year(2027), None);
        assert!(
            catalog
                .articles()
                .iter()
                .all(|a| a.source == ArticleSource::Static)
        );
    }

    #[test]
    fn merge_keeps_static_first_and_drops_duplicate_dois() {
        let catalog = Catalog::bundled().unwrap();
        let dynamic = vec![
            sample_article(10, "mnj-2026-002", "1", "1"),
            sample_article(11, "MNJ-2026-004", "1", "2"),
            sample_article(12, "MNJ-2026-004", "1", "2"),
        ];

        let merged = merge_articles(catalog.articles(), dynamic);
        let dois: Vec<&str> = merged.iter().map(|a| a.doi.as_str()).collect();
        assert_eq!(
            dois,
            vec!["MNJ-2026-001", "MNJ-2026-002", "MNJ-2026-003", "MNJ-2026-004"]
        );
        assert_eq!(merged[1].source, ArticleSource::Static);
        assert_eq!(merged[3].id, 11);

        let unique: HashSet<String> = merged.iter().map(|a| a.doi.to_uppercase()).collect();
        assert_eq!(unique.len(), merged.len());
    }

    #[test]
    fn merged_ids_stay_unique_when_row_ids_start_at_one() {
        let catalog = Catalog::bundled().unwrap();
        assert!(catalog.articles().iter().all(|a| a.id < 0));

        let dynamic = vec![
            sample_article(1, "MNJ-2026-004", "1", "2"),
            sample_article(2, "MNJ-2026-005", "1", "2"),
            sample_article(3, "MNJ-2026-006", "1", "2"),
        ];
        let merged = merge_articles(catalog.articles(), dynamic);
        let ids: HashSet<i64> = merged.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), merged.len());
        assert_eq!(merged.len(), 6);
    }

    #[test]
    fn resolver_links_and_bare_dois_resolve_alike() {
        let catalog = Catalog::bundled().unwrap();
        let list = catalog.articles();

        assert_eq!(
            normalize_doi_query(" https://www.marinenotesjournal.com/doi/MNJ-2026-001 "),
            "MNJ-2026-001"
        );
        assert_eq!(normalize_doi_query("doi:MNJ-2026-002"), "MNJ-2026-002");

        let by_link = find_by_doi(list, "http://localhost:5173/doi/mnj-2026-003").unwrap();
        assert_eq!(by_link.doi, "MNJ-2026-003");
        assert!(find_by_doi(list, "MNJ-2026-999").is_none());
        assert!(find_by_doi(list, "   ").is_none());
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(search(catalog.articles(), "HUMPBACK").len(), 1);
        assert_eq!(search(catalog.articles(), "taklis").len(), 2);
        assert_eq!(search(catalog.articles(), "").len(), 3);
        assert!(search(catalog.articles(), "sea otter").is_empty());
    }

    #[test]
    fn archive_groups_newest_volume_and_issue_first() {
        let list = vec![
            sample_article(1, "MNJ-2026-001", "1", "1"),
            sample_article(2, "MNJ-2026-002", "2", "1"),
            sample_article(3, "MNJ-2026-003", "1", "10"),
            sample_article(4, "MNJ-2026-004", "1", "2"),
        ];
        let archive = group_archive(&list);
        assert_eq!(archive.len(), 2);
        assert_eq!(archive[0].volume, "2");
        let issues: Vec<&str> = archive[1].issues.iter().map(|i| i.issue.as_str()).collect();
        assert_eq!(issues, vec!["10", "2", "1"]);
        assert_eq!(archive[1].year, Some(2026));
    }

    #[test]
    fn citation_follows_reference_layout() {
        let article = sample_article(3, "MNJ-2026-003", "1", "1");
        assert_eq!(
            format_citation(&article),
            "Christos Taklis (2026). Observation note 3. Marine Notes Journal, 1(1). MNJ-2026-003"
        );
    }
}
