//! Per-file and per-run outcome summaries.

use crate::error::Error;
use std::path::PathBuf;

/// What one successfully processed input file produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    /// The input file.
    pub input: PathBuf,
    /// Output files written, in order.
    pub outputs: Vec<PathBuf>,
    /// Structured entries that rendered to non-empty text.
    pub records: usize,
    /// Cleaned lines accepted into the chunker.
    pub lines: usize,
    /// JSON units (lines or whole files) skipped because they failed to parse.
    pub skipped_units: usize,
    /// Lines or files that contained invalid UTF-8 and were repaired.
    pub decode_repairs: usize,
}

impl FileReport {
    /// Creates an empty report for an input file.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    /// Returns true if nothing was written for this input.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// The outcome of one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileReport, Error>,
}

/// Aggregated outcome of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One entry per dispatched file, in input order.
    pub outcomes: Vec<FileOutcome>,
    /// Files skipped because of an unsupported extension.
    pub skipped: Vec<PathBuf>,
}

impl RunSummary {
    /// Successful files.
    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed files with their errors.
    pub fn failed(&self) -> impl Iterator<Item = (&PathBuf, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.path, e)))
    }

    /// Number of successful files.
    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    /// Number of failed files.
    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Total output files written.
    pub fn output_count(&self) -> usize {
        self.succeeded().map(|r| r.outputs.len()).sum()
    }

    /// Total skipped JSON units across successful files.
    pub fn skipped_units(&self) -> usize {
        self.succeeded().map(|r| r.skipped_units).sum()
    }
}
