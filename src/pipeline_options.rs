//! Options for controlling a cleaning run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default maximum characters per output line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 30_000;

/// Default maximum size of one output file (500 MiB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 500 * 1024 * 1024;

/// Default in-memory accumulation before a chunk is flushed (64 MiB).
pub const DEFAULT_CHUNK_THRESHOLD: usize = 64 * 1024 * 1024;

/// Default cap on concurrent file workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default per-file processing time limit in seconds.
pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 300;

/// Options for a cleaning run.
///
/// Constructed once, validated with [`PipelineOptions::validate`], then shared
/// read-only by every component. All fields are optional when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Root of the input tree.
    pub input_dir: PathBuf,

    /// Directory receiving the cleaned `.txt` files.
    pub output_dir: PathBuf,

    /// Stopword list, one word per line.
    pub stopwords_path: Option<PathBuf>,

    /// Whether stopword filtering runs at chunk flush.
    pub stopwords_enabled: bool,

    /// Whether traditional characters are converted to simplified ones.
    pub convert_script: bool,

    /// Which character classes survive normalization.
    pub charset: CharsetMode,

    /// Apply Unicode NFC before any other normalization stage.
    pub nfc_normalize: bool,

    /// Fail a file on invalid UTF-8 instead of replacing the bad bytes.
    pub strict_utf8: bool,

    /// Strip leftover JSON keys and `"id"/"问"` fragments from raw lines.
    pub strip_json_residue: bool,

    /// Noise phrases removed in addition to the built-in list.
    pub extra_noise_phrases: Vec<String>,

    /// Maximum characters per output line; longer lines are hard-split.
    pub max_line_length: usize,

    /// Maximum bytes per output file.
    pub max_file_size: usize,

    /// Accumulated bytes that trigger a chunk flush.
    pub chunk_threshold: usize,

    /// Upper bound on concurrent file workers.
    pub max_workers: usize,

    /// Whether files are processed concurrently.
    pub parallel: bool,

    /// Extensions routed to a pipeline path, lower-case and without the dot.
    /// The empty string stands for files without an extension.
    pub supported_extensions: Vec<String>,

    /// Per-file time limit in seconds (`None` = unlimited).
    pub file_timeout_secs: Option<u64>,

    /// How output files are named.
    pub output_naming: OutputNaming,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("corpus_input"),
            output_dir: PathBuf::from("corpus_cleaned"),
            stopwords_path: None,
            stopwords_enabled: false,
            convert_script: true,
            charset: CharsetMode::AlphanumericCjk,
            nfc_normalize: false,
            strict_utf8: false,
            strip_json_residue: false,
            extra_noise_phrases: Vec::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            max_workers: DEFAULT_MAX_WORKERS,
            parallel: true,
            supported_extensions: ["txt", "", "json", "jsonl", "yaml", "xml", "csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            file_timeout_secs: Some(DEFAULT_FILE_TIMEOUT_SECS),
            output_naming: OutputNaming::Numbered,
        }
    }
}

impl PipelineOptions {
    /// Creates new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::Json {
            path: path.to_path_buf(),
            line: Some(e.line()),
            message: e.to_string(),
        })
    }

    /// Sets the input directory.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enables stopword filtering with the given list.
    pub fn with_stopwords(mut self, path: impl Into<PathBuf>) -> Self {
        self.stopwords_path = Some(path.into());
        self.stopwords_enabled = true;
        self
    }

    /// Disables traditional-to-simplified conversion.
    pub fn without_script_conversion(mut self) -> Self {
        self.convert_script = false;
        self
    }

    /// Keeps only CJK ideographs (drops ASCII letters and digits).
    pub fn cjk_only(mut self) -> Self {
        self.charset = CharsetMode::CjkOnly;
        self
    }

    /// Enables Unicode NFC normalization before cleaning.
    pub fn with_nfc(mut self) -> Self {
        self.nfc_normalize = true;
        self
    }

    /// Enables stripping of leftover JSON keys from raw text lines.
    pub fn with_json_residue_stripping(mut self) -> Self {
        self.strip_json_residue = true;
        self
    }

    /// Rejects files containing invalid UTF-8.
    pub fn with_strict_utf8(mut self) -> Self {
        self.strict_utf8 = true;
        self
    }

    /// Adds a noise phrase to the built-in list.
    pub fn with_noise_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.extra_noise_phrases.push(phrase.into());
        self
    }

    /// Sets the maximum line length in characters.
    pub fn with_max_line_length(mut self, chars: usize) -> Self {
        self.max_line_length = chars;
        self
    }

    /// Sets the maximum output file size in bytes.
    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Sets the chunk flush threshold in bytes.
    pub fn with_chunk_threshold(mut self, bytes: usize) -> Self {
        self.chunk_threshold = bytes;
        self
    }

    /// Sets the worker cap.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Disables parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Sets the per-file time limit (`None` = unlimited).
    pub fn with_file_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.file_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    /// Names a file's only output `{basename}.txt` instead of `{basename}_1.txt`.
    pub fn with_compact_names(mut self) -> Self {
        self.output_naming = OutputNaming::Compact;
        self
    }

    /// Per-file time limit.
    pub fn file_timeout(&self) -> Option<Duration> {
        self.file_timeout_secs.map(Duration::from_secs)
    }

    /// Effective pool size: the worker cap bounded by available parallelism.
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_workers.min(available).max(1)
    }

    /// Returns true if files with this extension are processed.
    pub fn is_supported_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.supported_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&extension))
    }

    /// Checks limits before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_line_length == 0 {
            return Err(Error::Config("max_line_length must be at least 1".into()));
        }
        if self.max_file_size < 4 {
            // One UTF-8 character must always fit.
            return Err(Error::Config("max_file_size must be at least 4 bytes".into()));
        }
        if self.chunk_threshold == 0 {
            return Err(Error::Config("chunk_threshold must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".into()));
        }
        if self.file_timeout_secs == Some(0) {
            return Err(Error::Config(
                "file_timeout_secs must be positive; omit it for no limit".into(),
            ));
        }
        if self.stopwords_enabled && self.stopwords_path.is_none() {
            return Err(Error::Config(
                "stopword filtering is enabled but no stopword file is set".into(),
            ));
        }
        if self.extra_noise_phrases.iter().any(|p| p.is_empty()) {
            return Err(Error::Config("noise phrases must not be empty".into()));
        }
        Ok(())
    }
}

/// Which character classes survive the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharsetMode {
    /// ASCII letters and digits plus CJK ideographs.
    #[default]
    AlphanumericCjk,
    /// CJK ideographs only.
    CjkOnly,
}

/// Output file naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// Always `{basename}_{n}.txt`.
    #[default]
    Numbered,
    /// `{basename}.txt` when a file yields a single output, numbered otherwise.
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let options = PipelineOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.convert_script);
        assert!(!options.stopwords_enabled);
        assert_eq!(options.file_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_worker_count_is_bounded() {
        let options = PipelineOptions::default().with_max_workers(1);
        assert_eq!(options.worker_count(), 1);

        let options = PipelineOptions::default().with_max_workers(10_000);
        assert!(options.worker_count() >= 1);
        assert!(options.worker_count() < 10_000);
    }

    #[test]
    fn test_extension_matching() {
        let options = PipelineOptions::default();
        assert!(options.is_supported_extension("TXT"));
        assert!(options.is_supported_extension(""));
        assert!(options.is_supported_extension("jsonl"));
        assert!(!options.is_supported_extension("pdf"));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        assert!(matches!(
            PipelineOptions::default().with_max_line_length(0).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineOptions::default().with_max_file_size(3).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineOptions::default().with_max_workers(0).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineOptions::default().with_noise_phrase("").validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stopwords_require_path() {
        let mut options = PipelineOptions::default();
        options.stopwords_enabled = true;
        assert!(options.validate().is_err());
        assert!(options.with_stopwords("stop.txt").validate().is_ok());
    }

    #[test]
    fn test_json_partial_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(
            &path,
            r#"{"input_dir": "raw", "charset": "cjk_only", "max_workers": 2, "file_timeout_secs": null}"#,
        )
        .unwrap();

        let options = PipelineOptions::from_json_file(&path).unwrap();
        assert_eq!(options.input_dir, PathBuf::from("raw"));
        assert_eq!(options.charset, CharsetMode::CjkOnly);
        assert_eq!(options.max_workers, 2);
        assert_eq!(options.file_timeout(), None);
        assert_eq!(options.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_malformed_json_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineOptions::from_json_file(&path),
            Err(Error::Json { .. })
        ));
    }
}
