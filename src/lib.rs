//! # corpus-clean
//!
//! A parallel text-normalization pipeline that turns raw TXT/JSON/JSONL
//! corpora into clean, line-oriented plain text for language-model training.
//!
//! ## Supported Inputs
//!
//! - **JSON**: one object, or an array of objects, with known fields
//! - **JSONL**: one object per line; malformed lines are skipped
//! - **Text**: `.txt`, `.yaml`, `.xml`, `.csv` and extensionless files, read line by line
//!
//! ## Quick Start
//!
//! ```no_run
//! use corpus_clean::PipelineOptions;
//!
//! fn main() -> corpus_clean::Result<()> {
//!     let options = PipelineOptions::default()
//!         .with_input_dir("./raw")
//!         .with_output_dir("./cleaned");
//!
//!     let summary = corpus_clean::clean_directory(options)?;
//!     println!("{} files cleaned", summary.success_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `async`: Async entry points with Tokio

pub mod chunk;
pub mod cleanup;
pub mod detect;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod pipeline_options;
pub mod render;
pub mod script;
pub mod stopwords;
pub mod worker;

#[cfg(feature = "async")]
pub mod async_api;

// Re-exports
pub use chunk::ChunkWriter;
pub use cleanup::LineNormalizer;
pub use detect::{classify_path, detect_input_kind, InputKind};
pub use error::{Error, Result};
pub use model::{Field, FileOutcome, FileReport, Record, RunSummary};
pub use pipeline::{collect_inputs, InputSet, PipelineContext};
pub use pipeline_options::{CharsetMode, OutputNaming, PipelineOptions};
pub use render::format_entry;
pub use script::ScriptConversion;
pub use stopwords::StopWords;
pub use worker::CancelToken;

use std::path::Path;

/// Cleans every supported file under `options.input_dir`.
///
/// # Example
///
/// ```no_run
/// use corpus_clean::{clean_directory, PipelineOptions};
///
/// let options = PipelineOptions::default()
///     .with_input_dir("./raw")
///     .with_output_dir("./cleaned")
///     .with_max_workers(8);
///
/// let summary = clean_directory(options)?;
/// for (path, error) in summary.failed() {
///     eprintln!("{}: {}", path.display(), error);
/// }
/// # Ok::<(), corpus_clean::Error>(())
/// ```
pub fn clean_directory(options: PipelineOptions) -> Result<RunSummary> {
    pipeline::run(options)
}

/// Cleans a single file into `options.output_dir`.
///
/// The per-file timeout does not apply here.
pub fn clean_file(path: impl AsRef<Path>, options: PipelineOptions) -> Result<FileReport> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::Config(format!("input file not found: {}", path.display())));
    }
    PipelineContext::new(options)?.process_file(path)
}

/// Normalizes a piece of text with the line normalizer and script converter.
///
/// Stopwords, line-length limits and chunking are not applied. Returns `None`
/// when nothing survives.
///
/// # Example
///
/// ```
/// use corpus_clean::{clean_text, PipelineOptions};
///
/// let options = PipelineOptions::default();
/// let cleaned = clean_text("漢字，很好！", &options)?;
/// assert_eq!(cleaned.as_deref(), Some("汉字\n很好"));
/// # Ok::<(), corpus_clean::Error>(())
/// ```
pub fn clean_text(text: &str, options: &PipelineOptions) -> Result<Option<String>> {
    let normalizer = LineNormalizer::new(options)?;
    let conversion = ScriptConversion::from_enabled(options.convert_script);
    Ok(normalizer
        .normalize(text)
        .map(|cleaned| conversion.convert(&cleaned).into_owned()))
}
