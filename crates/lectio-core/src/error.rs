//! Error kinds surfaced by the reader.
//!
//! The `Display` text of each variant is what a tab shows to the user, so keep
//! the wording readable rather than diagnostic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Please enter a book name (e.g., \"Romans\") or reference (e.g., \"Romans 2:12\")")]
    EmptyInput,

    #[error("\"{0}\" is not a recognized reference. Try abbreviations like \"rom\", \"1kgs\", or full names")]
    InvalidReference(String),

    #[error("Book \"{0}\" not found")]
    UnknownBook(String),

    #[error("{book} has {last} chapters, chapter {chapter} is out of range")]
    ChapterOutOfRange { book: String, chapter: u32, last: u32 },

    #[error("Failed to load verses: {message}")]
    FetchFailure { status: Option<u16>, message: String },

    #[error("No verses found for {book} {chapter}")]
    NoVersesFound { book: String, chapter: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::FetchFailure {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::FetchFailure {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
