//! Error types for tsuzuri operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort a volume build.
///
/// Per-item problems (a missing chapter file, an unreadable image) are not
/// represented here: they are logged and skipped where they occur.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("manifest has no chapters (checked `chapters` and `structure.chapters`)")]
    ChaptersMissing,

    #[error("upstream stage `{stage}` is not complete (status: {status})")]
    UpstreamIncomplete { stage: String, status: String },

    #[error("no chapter content could be read for this volume")]
    NoContent,

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),
}

pub type Result<T> = std::result::Result<T, Error>;
