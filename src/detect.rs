//! Input classification by file extension.

use crate::error::{Error, Result};
use crate::pipeline_options::PipelineOptions;
use std::path::Path;

/// Pipeline path an input file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single JSON document (object or array of objects).
    Json,
    /// Line-delimited JSON, one record per line.
    Jsonl,
    /// Anything read line by line as text.
    PlainText,
}

impl InputKind {
    /// Returns true for the structured (record-extracting) paths.
    pub fn is_structured(self) -> bool {
        matches!(self, InputKind::Json | InputKind::Jsonl)
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Json => write!(f, "JSON"),
            InputKind::Jsonl => write!(f, "JSONL"),
            InputKind::PlainText => write!(f, "text"),
        }
    }
}

/// Lower-cased extension without the dot; empty when there is none.
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// File stem used to name outputs.
pub fn basename_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Classifies a path, or returns `None` if its extension is not enabled.
pub fn classify_path(path: impl AsRef<Path>, options: &PipelineOptions) -> Option<InputKind> {
    let extension = extension_of(path);
    if !options.is_supported_extension(&extension) {
        return None;
    }
    Some(match extension.as_str() {
        "json" => InputKind::Json,
        "jsonl" => InputKind::Jsonl,
        _ => InputKind::PlainText,
    })
}

/// Like [`classify_path`], but reports unsupported files as an error.
pub fn detect_input_kind(path: impl AsRef<Path>, options: &PipelineOptions) -> Result<InputKind> {
    let path = path.as_ref();
    classify_path(path, options).ok_or_else(|| {
        Error::UnsupportedFormat(format!("{} ({})", path.display(), extension_of(path)))
    })
}
