//! Error types for the corpus-clean library.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for corpus-clean operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the corpus-clean library.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON or JSONL unit could not be parsed.
    ///
    /// `line` is 1-based for JSONL inputs and `None` for whole-file JSON.
    #[error("JSON parse error in {}{}: {message}", path.display(), line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Json {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// Invalid UTF-8 in an input read with strict decoding enabled.
    #[error("Text encoding error in {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// A file did not finish within its allotted time.
    #[error("Processing {} timed out after {}s", path.display(), after.as_secs_f64())]
    Timeout { path: PathBuf, after: Duration },

    /// Processing stopped because its cancel token was set.
    #[error("Processing cancelled")]
    Cancelled,

    /// Another input already writes outputs under the same basename.
    #[error("{} would overwrite the outputs of {}", path.display(), existing.display())]
    OutputCollision { path: PathBuf, existing: PathBuf },

    /// The thread processing a file panicked.
    #[error("Worker processing {} panicked", path.display())]
    WorkerPanicked { path: PathBuf },

    /// The stopword list could not be read.
    #[error("Failed to load stopwords from {}: {source}", path.display())]
    Stopwords {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The file extension is not routed to any pipeline path.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Returns true for failures caused by the per-file time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if processing was stopped through a cancel token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
