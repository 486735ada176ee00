use std::path::{Component, Path, PathBuf};

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::error::ErrorStatus;
use crate::validation::sanitize_file_name;

pub const BUCKET: &str = "manuscripts";
const PDF_MAGIC: &[u8] = b"%PDF";
const MAX_SLUG_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("File data is not valid base64")]
    InvalidEncoding,
    #[error("File is not a PDF")]
    NotPdf,
    #[error("Invalid storage path")]
    InvalidPath,
    #[error("File not found")]
    NotFound,
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorStatus for StorageError {
    fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidEncoding | Self::NotPdf | Self::InvalidPath => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Io(_) => "Failed to store file".to_string(),
            other => other.to_string(),
        }
    }
}

/// Local stand-in for the `manuscripts` bucket. Objects live under
/// `<upload_dir>/manuscripts/` and are served from `/uploads/manuscripts/`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    public_base: String,
}

impl ObjectStore {
    pub fn new(upload_dir: &Path, public_base_url: &str) -> Self {
        Self {
            root: upload_dir.join(BUCKET),
            public_base: format!(
                "{}/uploads/{}",
                public_base_url.trim_end_matches('/'),
                BUCKET
            ),
        }
    }

    /// Writes `bytes` at `path`, replacing any existing object.
    pub async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path, size = bytes.len(), "Stored object");
        Ok(self.public_url(path))
    }

    pub async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound)
            }
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    /// Removes the object at `path`. A missing object is not an error.
    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path.trim_start_matches('/'))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let is_clean = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.trim().is_empty() || !is_clean {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    slug
}

/// `<year>/<doi>-<slug>.pdf`
pub fn article_pdf_path(year: i32, doi: &str, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}/{}.pdf", year, doi)
    } else {
        format!("{}/{}-{}.pdf", year, doi, slug)
    }
}

/// `submissions/<userId|anonymous>/<timestamp>-<filename>`
pub fn submission_file_path(user_id: Option<i64>, timestamp_millis: i64, file_name: &str) -> String {
    let owner = user_id.map_or_else(|| "anonymous".to_string(), |id| id.to_string());
    format!(
        "submissions/{}/{}-{}",
        owner,
        timestamp_millis,
        sanitize_file_name(file_name)
    )
}

/// Accepts raw base64 or a `data:application/pdf;base64,` URL.
pub fn decode_pdf(data: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
    let payload = data
        .split_once(";base64,")
        .map_or(data, |(_, encoded)| encoded)
        .trim();

    // Decoded size is three quarters of the encoded length.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(StorageError::TooLarge { limit: max_bytes });
    }

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| StorageError::InvalidEncoding)?;

    if bytes.len() > max_bytes {
        return Err(StorageError::TooLarge { limit: max_bytes });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(StorageError::NotPdf);
    }
    Ok(bytes)
}
