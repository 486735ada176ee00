use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Article, ArticleMetrics};

pub const CSV_HEADER: [&str; 7] = [
    "DOI",
    "Title",
    "Citations",
    "Downloads",
    "Views",
    "Altmetric Score",
    "Social Shares",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    #[default]
    Citations,
    Downloads,
    Views,
    #[serde(alias = "altmetric", alias = "altmetric_score")]
    AltmetricScore,
    #[serde(alias = "shares", alias = "social_shares")]
    SocialShares,
}

impl MetricKey {
    fn value(self, metrics: &ArticleMetrics) -> f64 {
        match self {
            Self::Citations => metrics.citations as f64,
            Self::Downloads => metrics.downloads as f64,
            Self::Views => metrics.views as f64,
            Self::AltmetricScore => metrics.altmetric_score,
            Self::SocialShares => metrics.social_shares as f64,
        }
    }
}

fn metrics_of(article: &Article) -> ArticleMetrics {
    article.metrics.unwrap_or_default()
}

/// Journal-wide totals. Articles without metrics contribute zero.
pub fn summarize(articles: &[Article]) -> ArticleMetrics {
    articles
        .iter()
        .map(metrics_of)
        .fold(ArticleMetrics::default(), |mut total, metrics| {
            total.citations += metrics.citations;
            total.downloads += metrics.downloads;
            total.views += metrics.views;
            total.altmetric_score += metrics.altmetric_score;
            total.social_shares += metrics.social_shares;
            total
        })
}

fn matches_metrics_search(article: &Article, term: &str) -> bool {
    let term = term.to_lowercase();
    [&article.title, &article.authors, &article.doi]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
}

/// Filters on title, authors and DOI, then orders by `key`, highest first.
/// Ties keep catalog order.
pub fn rank(articles: &[Article], key: MetricKey, search: Option<&str>) -> Vec<Article> {
    let term = search.map(str::trim).filter(|t| !t.is_empty());
    let mut ranked: Vec<Article> = articles
        .iter()
        .filter(|article| term.is_none_or(|t| matches_metrics_search(article, t)))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        let a_value = key.value(&metrics_of(a));
        let b_value = key.value(&metrics_of(b));
        b_value.partial_cmp(&a_value).unwrap_or(Ordering::Equal)
    });
    ranked
}

pub fn export_csv(articles: &[Article]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for article in articles {
        let metrics = metrics_of(article);
        writer.write_record([
            article.doi.clone(),
            article.title.clone(),
            metrics.citations.to_string(),
            metrics.downloads.to_string(),
            metrics.views.to_string(),
            metrics.altmetric_score.to_string(),
            metrics.social_shares.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))
}

pub fn report_file_name(date: chrono::NaiveDate) -> String {
    format!("citation-report-{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, sample_article};

    fn with_metrics(id: i64, citations: i64, downloads: i64) -> Article {
        let mut article = sample_article(id, &format!("MNJ-2026-{id:03}"), "1", "1");
        article.metrics = Some(ArticleMetrics {
            citations,
            downloads,
            ..ArticleMetrics::default()
        });
        article
    }

    #[test]
    fn summary_treats_missing_metrics_as_zero() {
        let articles = vec![
            with_metrics(1, 4, 10),
            sample_article(2, "MNJ-2026-002", "1", "1"),
            with_metrics(3, 1, 5),
        ];
        let total = summarize(&articles);
        assert_eq!(total.citations, 5);
        assert_eq!(total.downloads, 15);
        assert_eq!(total.views, 0);
    }

    #[test]
    fn rank_sorts_descending_and_keeps_ties_in_order() {
        let articles = vec![
            with_metrics(1, 2, 50),
            with_metrics(2, 9, 10),
            sample_article(3, "MNJ-2026-003", "1", "1"),
            with_metrics(4, 2, 70),
        ];

        let by_citations: Vec<i64> = rank(&articles, MetricKey::Citations, None)
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(by_citations, vec![2, 1, 4, 3]);

        let by_downloads: Vec<i64> = rank(&articles, MetricKey::Downloads, Some("  "))
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(by_downloads, vec![4, 1, 2, 3]);
    }

    #[test]
    fn rank_search_matches_doi_but_not_abstract() {
        let articles = vec![with_metrics(1, 0, 0), with_metrics(2, 0, 0)];
        let hits = rank(&articles, MetricKey::Views, Some("mnj-2026-002"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);

        assert!(rank(&articles, MetricKey::Views, Some("cetaceans")).is_empty());
    }

    #[test]
    fn sort_keys_accept_ui_names() {
        let key: MetricKey = serde_json::from_str("\"altmetricScore\"").unwrap();
        assert_eq!(key, MetricKey::AltmetricScore);
        let key: MetricKey = serde_json::from_str("\"shares\"").unwrap();
        assert_eq!(key, MetricKey::SocialShares);
    }

    #[test]
    fn csv_report_quotes_titles_with_commas() {
        let mut article = with_metrics(1, 3, 7);
        article.title = "Orcas, boats and rudders".to_string();
        let csv = String::from_utf8(export_csv(&[article]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("DOI,Title,Citations,Downloads,Views,Altmetric Score,Social Shares")
        );
        assert_eq!(
            lines.next(),
            Some("MNJ-2026-001,\"Orcas, boats and rudders\",3,7,0,0,0")
        );
    }

    #[test]
    fn bundled_catalog_has_metrics_for_ranking() {
        let catalog = Catalog::bundled().unwrap();
        let ranked = rank(catalog.articles(), MetricKey::Citations, None);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].doi, "MNJ-2026-001");
        assert_eq!(
            report_file_name(chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()),
            "citation-report-2026-03-01.csv"
        );
    }
}
