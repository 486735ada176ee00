use std::sync::LazyLock;

use axum::http::StatusCode;
use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::error::ErrorStatus;
use crate::models::{ArticleInput, NewSubmission};

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 500;
pub const AUTHORS_MIN_CHARS: usize = 2;
pub const AUTHORS_MAX_CHARS: usize = 1000;
pub const ABSTRACT_MIN_CHARS: usize = 20;
pub const ABSTRACT_MAX_CHARS: usize = 5000;

pub const ARTICLE_TYPES: [&str; 6] = [
    "Research",
    "Notes",
    "Review",
    "Case Study",
    "Conservation News",
    "Technical Report / Risk Assessment",
];

pub const MANUSCRIPT_TYPES: [&str; 9] = [
    "research-article",
    "review",
    "short-communication",
    "technical-report",
    "field-notes",
    "observational-reports",
    "conservation-news",
    "case-study",
    "methodology",
];

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html tag pattern"));
static VOLUME_OR_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,4}$").expect("valid volume pattern"));
static DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^MNJ-[0-9]{4}-(?:[0-9]{3}|[1-9][0-9]{3,})$").expect("valid doi pattern")
});
static ORCID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$").expect("valid orcid pattern")
});
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]").expect("valid file name pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },
    #[error("Invalid article type")]
    ArticleType,
    #[error("Invalid manuscript type")]
    ManuscriptType,
    #[error("{0} must be a number of 1 to 4 digits")]
    Numbering(&'static str),
    #[error("DOI must have the form MNJ-YYYY-NNN")]
    Doi,
    #[error("Invalid ORCID: {0}")]
    Orcid(String),
    #[error("Publication date must be YYYY-MM-DD")]
    PublicationDate,
    #[error("PDF URL must be an http(s) URL or a site path")]
    PdfUrl,
    #[error("Invalid email address")]
    Email,
    #[error("Please agree to all copyright transfer terms")]
    Copyright,
    #[error("Please provide your electronic signature")]
    Signature,
    #[error("At least one manuscript file is required")]
    Files,
}

impl ErrorStatus for ValidationError {
    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Article fields after tag stripping and bounds checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArticle {
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    pub orcid_ids: Vec<String>,
    pub article_type: String,
    pub publication_date: NaiveDate,
    pub pdf_url: Option<String>,
    pub volume: String,
    pub issue: String,
    pub abstract_text: String,
}

pub fn strip_html(input: &str) -> String {
    HTML_TAG.replace_all(input, "").trim().to_string()
}

pub fn is_valid_orcid(raw: &str) -> bool {
    ORCID.is_match(raw)
}

/// `today` fills in a missing publication date.
pub fn validate_article(
    input: &ArticleInput,
    today: NaiveDate,
) -> Result<ValidatedArticle, ValidationError> {
    let title = strip_html(&input.title);
    check_length("Title", &title, TITLE_MIN_CHARS, TITLE_MAX_CHARS)?;

    let authors = strip_html(&input.authors);
    check_length("Authors", &authors, AUTHORS_MIN_CHARS, AUTHORS_MAX_CHARS)?;

    let abstract_text = strip_html(&input.abstract_text);
    check_length("Abstract", &abstract_text, ABSTRACT_MIN_CHARS, ABSTRACT_MAX_CHARS)?;

    let article_type = input.article_type.trim();
    if !ARTICLE_TYPES.contains(&article_type) {
        return Err(ValidationError::ArticleType);
    }

    let volume = input.volume.trim();
    if !VOLUME_OR_ISSUE.is_match(volume) {
        return Err(ValidationError::Numbering("Volume"));
    }
    let issue = input.issue.trim();
    if !VOLUME_OR_ISSUE.is_match(issue) {
        return Err(ValidationError::Numbering("Issue"));
    }

    let doi = match non_empty(input.doi.as_deref()) {
        Some(doi) if DOI.is_match(doi) => Some(doi.to_string()),
        Some(_) => return Err(ValidationError::Doi),
        None => None,
    };

    let mut orcid_ids = Vec::with_capacity(input.orcid_ids.len());
    for raw in &input.orcid_ids {
        let orcid = raw.trim();
        if orcid.is_empty() {
            continue;
        }
        if !is_valid_orcid(orcid) {
            return Err(ValidationError::Orcid(orcid.to_string()));
        }
        orcid_ids.push(orcid.to_string());
    }

    let publication_date = match non_empty(input.publication_date.as_deref()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ValidationError::PublicationDate)?,
        None => today,
    };

    let pdf_url = match non_empty(input.pdf_url.as_deref()) {
        Some(url) if is_acceptable_pdf_url(url) => Some(url.to_string()),
        Some(_) => return Err(ValidationError::PdfUrl),
        None => None,
    };

    Ok(ValidatedArticle {
        doi,
        title,
        authors,
        orcid_ids,
        article_type: article_type.to_string(),
        publication_date,
        pdf_url,
        volume: volume.to_string(),
        issue: issue.to_string(),
        abstract_text,
    })
}

/// Checks a submission form and returns it trimmed.
pub fn validate_submission(
    input: &NewSubmission,
    file_count: usize,
) -> Result<NewSubmission, ValidationError> {
    let title = input.title.trim().to_string();
    check_length("Title", &title, TITLE_MIN_CHARS, TITLE_MAX_CHARS)?;

    let manuscript_type = input.manuscript_type.trim().to_string();
    if manuscript_type.is_empty() {
        return Err(ValidationError::Required("Manuscript type"));
    }
    if !MANUSCRIPT_TYPES.contains(&manuscript_type.as_str()) {
        return Err(ValidationError::ManuscriptType);
    }

    let abstract_text = required("Abstract", &input.abstract_text)?;
    let keywords = required("Keywords", &input.keywords)?;
    let author_name = required("Corresponding author name", &input.corresponding_author_name)?;
    let affiliation = required("Affiliation", &input.corresponding_author_affiliation)?;
    let all_authors = required("All authors", &input.all_authors)?;

    let email = required("Email", &input.corresponding_author_email)?;
    if !EMAIL.is_match(&email) {
        return Err(ValidationError::Email);
    }

    let orcid = non_empty(input.corresponding_author_orcid.as_deref()).map(str::to_string);
    if let Some(orcid) = &orcid {
        if !is_valid_orcid(orcid) {
            return Err(ValidationError::Orcid(orcid.clone()));
        }
    }

    if !(input.copyright_original
        && input.copyright_approved
        && input.copyright_transfer
        && input.copyright_cc)
    {
        return Err(ValidationError::Copyright);
    }
    let signature = input.copyright_signature.trim().to_string();
    if signature.is_empty() {
        return Err(ValidationError::Signature);
    }

    if file_count == 0 {
        return Err(ValidationError::Files);
    }

    Ok(NewSubmission {
        title,
        manuscript_type,
        abstract_text,
        keywords,
        corresponding_author_name: author_name,
        corresponding_author_email: email,
        corresponding_author_affiliation: affiliation,
        corresponding_author_orcid: orcid,
        all_authors,
        cover_letter: non_empty(input.cover_letter.as_deref()).map(str::to_string),
        copyright_original: true,
        copyright_approved: true,
        copyright_transfer: true,
        copyright_cc: true,
        copyright_signature: signature,
    })
}

pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned = UNSAFE_FILE_CHARS.replace_all(base, "_").to_string();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(ValidationError::Required(field));
    }
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_acceptable_pdf_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://") || url.starts_with('/')
}

#[cfg(test)]
pub(crate) fn sample_article_input() -> ArticleInput {
    ArticleInput {
        title: "Seagrass meadow recovery in the Pagasetic Gulf".to_string(),
        authors: "Christos Taklis".to_string(),
        orcid_ids: vec!["0000-0001-9181-0292".to_string()],
        article_type: "Research".to_string(),
        publication_date: Some("2026-03-01".to_string()),
        volume: "1".to_string(),
        issue: "2".to_string(),
        abstract_text: "A two-year survey of Posidonia oceanica recovery after trawling bans."
            .to_string(),
        ..ArticleInput::default()
    }
}

#[cfg(test)]
pub(crate) fn sample_submission() -> NewSubmission {
    NewSubmission {
        title: "Loggerhead nesting on Skiathos".to_string(),
        manuscript_type: "field-notes".to_string(),
        abstract_text: "Nest counts for the 2025 season.".to_string(),
        keywords: "Caretta caretta, nesting".to_string(),
        corresponding_author_name: "Eleni Papadopoulou".to_string(),
        corresponding_author_email: "eleni@example.org".to_string(),
        corresponding_author_affiliation: "University of Thessaly".to_string(),
        corresponding_author_orcid: None,
        all_authors: "Eleni Papadopoulou".to_string(),
        cover_letter: None,
        copyright_original: true,
        copyright_approved: true,
        copyright_transfer: true,
        copyright_cc: true,
        copyright_signature: "Eleni Papadopoulou".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    #[test]
    fn title_bounds_are_inclusive() {
        let mut input = sample_article_input();
        input.title = "abc".to_string();
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::Length {
                field: "Title",
                min: TITLE_MIN_CHARS,
                max: TITLE_MAX_CHARS
            })
        );

        input.title = "a".repeat(500);
        assert!(validate_article(&input, today()).is_ok());

        input.title = "a".repeat(501);
        assert!(validate_article(&input, today()).is_err());
    }

    #[test]
    fn orcid_format_is_enforced() {
        let mut input = sample_article_input();
        input.orcid_ids = vec!["123-456".to_string()];
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::Orcid("123-456".to_string()))
        );

        input.orcid_ids = vec!["0000-0001-9181-0292".to_string(), "  ".to_string()];
        let validated = validate_article(&input, today()).unwrap();
        assert_eq!(validated.orcid_ids, vec!["0000-0001-9181-0292"]);

        assert!(is_valid_orcid("0000-0002-1825-009X"));
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        let mut input = sample_article_input();
        input.orcid_ids = vec!["٠٠٠٠-٠٠٠١-٩١٨١-٠٢٩٢".to_string()];
        assert!(matches!(
            validate_article(&input, today()),
            Err(ValidationError::Orcid(_))
        ));

        let mut input = sample_article_input();
        input.volume = "١".to_string();
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::Numbering("Volume"))
        );

        let mut input = sample_article_input();
        input.doi = Some("MNJ-٢٠٢٦-٠٠٤".to_string());
        assert_eq!(validate_article(&input, today()), Err(ValidationError::Doi));

        let mut input = sample_submission();
        input.corresponding_author_orcid = Some("０000-0001-9181-0292".to_string());
        assert!(matches!(
            validate_submission(&input, 1),
            Err(ValidationError::Orcid(_))
        ));
    }

    #[test]
    fn html_is_stripped_before_length_checks() {
        let mut input = sample_article_input();
        input.title = "<b>Hi</b><script>x</script>".to_string();
        assert!(matches!(
            validate_article(&input, today()),
            Err(ValidationError::Length { field: "Title", .. })
        ));

        input.title = "<em>Orca</em> encounters off Portugal".to_string();
        let validated = validate_article(&input, today()).unwrap();
        assert_eq!(validated.title, "Orca encounters off Portugal");
    }

    #[test]
    fn enumerations_and_numbering_are_checked() {
        let mut input = sample_article_input();
        input.article_type = "Editorial".to_string();
        assert_eq!(validate_article(&input, today()), Err(ValidationError::ArticleType));

        let mut input = sample_article_input();
        input.volume = "12345".to_string();
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::Numbering("Volume"))
        );

        let mut input = sample_article_input();
        input.issue = "1a".to_string();
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::Numbering("Issue"))
        );
    }

    #[test]
    fn doi_date_and_pdf_url_are_optional_but_checked() {
        let mut input = sample_article_input();
        input.publication_date = None;
        let validated = validate_article(&input, today()).unwrap();
        assert_eq!(validated.publication_date, today());
        assert_eq!(validated.doi, None);

        input.doi = Some("MNJ-2026-12".to_string());
        assert_eq!(validate_article(&input, today()), Err(ValidationError::Doi));
        input.doi = Some("MNJ-2026-012".to_string());
        assert!(validate_article(&input, today()).is_ok());
        input.doi = Some("MNJ-2026-0004".to_string());
        assert_eq!(validate_article(&input, today()), Err(ValidationError::Doi));
        input.doi = Some("MNJ-2026-1004".to_string());
        assert!(validate_article(&input, today()).is_ok());
        input.doi = None;

        input.publication_date = Some("01/03/2026".to_string());
        assert_eq!(
            validate_article(&input, today()),
            Err(ValidationError::PublicationDate)
        );

        input.publication_date = None;
        input.pdf_url = Some("javascript:alert(1)".to_string());
        assert_eq!(validate_article(&input, today()), Err(ValidationError::PdfUrl));
        input.pdf_url = Some("/uploads/manuscripts/2026/a.pdf".to_string());
        assert!(validate_article(&input, today()).is_ok());
    }

    #[test]
    fn submission_requires_copyright_signature_and_files() {
        assert!(validate_submission(&sample_submission(), 1).is_ok());

        let mut input = sample_submission();
        input.copyright_cc = false;
        assert_eq!(validate_submission(&input, 1), Err(ValidationError::Copyright));

        let mut input = sample_submission();
        input.copyright_signature = "   ".to_string();
        assert_eq!(validate_submission(&input, 1), Err(ValidationError::Signature));

        assert_eq!(
            validate_submission(&sample_submission(), 0),
            Err(ValidationError::Files)
        );
    }

    #[test]
    fn submission_fields_are_checked() {
        let mut input = sample_submission();
        input.manuscript_type = "poem".to_string();
        assert_eq!(
            validate_submission(&input, 1),
            Err(ValidationError::ManuscriptType)
        );

        let mut input = sample_submission();
        input.corresponding_author_email = "not-an-email".to_string();
        assert_eq!(validate_submission(&input, 1), Err(ValidationError::Email));

        let mut input = sample_submission();
        input.keywords = " ".to_string();
        assert_eq!(
            validate_submission(&input, 1),
            Err(ValidationError::Required("Keywords"))
        );

        let mut input = sample_submission();
        input.corresponding_author_orcid = Some("".to_string());
        input.cover_letter = Some("  Dear editor  ".to_string());
        let cleaned = validate_submission(&input, 2).unwrap();
        assert_eq!(cleaned.corresponding_author_orcid, None);
        assert_eq!(cleaned.cover_letter.as_deref(), Some("Dear editor"));
    }

    #[test]
    fn file_names_are_made_storage_safe() {
        assert_eq!(sanitize_file_name("My Paper (v2).pdf"), "My_Paper__v2_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("résumé.docx"), "r_sum_.docx");
        assert_eq!(sanitize_file_name(".."), "file");
    }
}
