//! File dispatch: walking the input tree and cleaning each file.

use crate::chunk::ChunkWriter;
use crate::cleanup::LineNormalizer;
use crate::detect::{basename_of, classify_path, detect_input_kind, InputKind};
use crate::error::{Error, Result};
use crate::model::{records_from_document, FileOutcome, FileReport, Record, RunSummary};
use crate::pipeline_options::PipelineOptions;
use crate::render::format_entry;
use crate::stopwords::StopWords;
use crate::worker::{run_jobs, CancelToken};
use encoding_rs::UTF_8;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Everything a worker needs, built once per run and shared read-only.
#[derive(Debug)]
pub struct PipelineContext {
    options: PipelineOptions,
    normalizer: LineNormalizer,
    stopwords: StopWords,
}

impl PipelineContext {
    /// Validates the options, compiles the normalizer and loads stopwords.
    pub fn new(options: PipelineOptions) -> Result<Self> {
        options.validate()?;
        let normalizer = LineNormalizer::new(&options)?;
        let stopwords = match (&options.stopwords_path, options.stopwords_enabled) {
            (Some(path), true) => StopWords::load(path)?,
            _ => StopWords::empty(),
        };

        Ok(Self {
            options,
            normalizer,
            stopwords,
        })
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn normalizer(&self) -> &LineNormalizer {
        &self.normalizer
    }

    pub fn stopwords(&self) -> &StopWords {
        &self.stopwords
    }

    /// Cleans one input file into the output directory.
    pub fn process_file(&self, path: &Path) -> Result<FileReport> {
        self.process_file_with_cancel(path, &CancelToken::new())
    }

    /// Like [`process_file`](Self::process_file), stopping with
    /// [`Error::Cancelled`] once `cancel` is set.
    ///
    /// The token is checked before every line, record and output write. A
    /// file that fails for any reason leaves no outputs behind.
    pub fn process_file_with_cancel(&self, path: &Path, cancel: &CancelToken) -> Result<FileReport> {
        cancel.check()?;
        let kind = detect_input_kind(path, &self.options)?;
        tracing::debug!(
            path = %path.display(),
            %kind,
            structured = kind.is_structured(),
            "processing file"
        );
        let mut report = FileReport::new(path);
        let mut writer = ChunkWriter::new(
            &self.options.output_dir,
            basename_of(path),
            &self.options,
            &self.stopwords,
        )
        .with_cancel(cancel.clone());

        let parsed = match kind {
            InputKind::PlainText => self.process_text(path, cancel, &mut writer, &mut report),
            InputKind::Jsonl => self.process_jsonl(path, cancel, &mut writer, &mut report),
            InputKind::Json => self.process_json(path, cancel, &mut writer, &mut report),
        };
        if let Err(err) = parsed {
            writer.discard();
            return Err(err);
        }

        report.outputs = writer.finish()?;
        Ok(report)
    }

    fn process_text(
        &self,
        path: &Path,
        cancel: &CancelToken,
        writer: &mut ChunkWriter<'_>,
        report: &mut FileReport,
    ) -> Result<()> {
        let mut line_number = 0;
        for_each_line(path, cancel, |line, repaired| {
            line_number += 1;
            if repaired {
                self.record_repair(path, Some(line_number), report)?;
            }
            self.push_cleaned(line, writer, report)
        })
    }

    fn process_jsonl(
        &self,
        path: &Path,
        cancel: &CancelToken,
        writer: &mut ChunkWriter<'_>,
        report: &mut FileReport,
    ) -> Result<()> {
        let mut line_number = 0;
        for_each_line(path, cancel, |line, repaired| {
            line_number += 1;
            if repaired {
                self.record_repair(path, Some(line_number), report)?;
            }
            let line = line.trim();
            if line.is_empty() {
                return Ok(());
            }

            match serde_json::from_str::<Value>(line) {
                Ok(value) => self.push_record(&Record::from_json(&value), writer, report),
                Err(err) => {
                    let err = Error::Json {
                        path: path.to_path_buf(),
                        line: Some(line_number),
                        message: err.to_string(),
                    };
                    tracing::warn!(error = %err, "skipping malformed JSONL line");
                    report.skipped_units += 1;
                    Ok(())
                }
            }
        })
    }

    fn process_json(
        &self,
        path: &Path,
        cancel: &CancelToken,
        writer: &mut ChunkWriter<'_>,
        report: &mut FileReport,
    ) -> Result<()> {
        let bytes = fs::read(path)?;
        let (text, repaired) = UTF_8.decode_with_bom_removal(&bytes);
        if repaired {
            self.record_repair(path, None, report)?;
        }

        let document = match serde_json::from_str::<Value>(&text) {
            Ok(document) => document,
            Err(err) => {
                let err = Error::Json {
                    path: path.to_path_buf(),
                    line: None,
                    message: err.to_string(),
                };
                tracing::warn!(error = %err, "skipping malformed JSON file");
                report.skipped_units += 1;
                return Ok(());
            }
        };
        for record in records_from_document(&document) {
            cancel.check()?;
            self.push_record(&record, writer, report)?;
        }
        Ok(())
    }

    /// Counts a repaired decode, or fails the file in strict mode.
    fn record_repair(
        &self,
        path: &Path,
        line: Option<usize>,
        report: &mut FileReport,
    ) -> Result<()> {
        if self.options.strict_utf8 {
            let location = line.map(|l| format!(" at line {l}")).unwrap_or_default();
            return Err(Error::Decode {
                path: path.to_path_buf(),
                message: format!("invalid UTF-8{location}"),
            });
        }
        report.decode_repairs += 1;
        Ok(())
    }

    fn push_record(
        &self,
        record: &Record,
        writer: &mut ChunkWriter<'_>,
        report: &mut FileReport,
    ) -> Result<()> {
        let entry = format_entry(record);
        if entry.is_empty() {
            return Ok(());
        }
        report.records += 1;
        self.push_cleaned(&entry, writer, report)
    }

    fn push_cleaned(
        &self,
        text: &str,
        writer: &mut ChunkWriter<'_>,
        report: &mut FileReport,
    ) -> Result<()> {
        if let Some(cleaned) = self.normalizer.normalize(text) {
            report.lines += 1;
            writer.push(cleaned)?;
        }
        Ok(())
    }
}

/// Reads a file line by line, decoding each line as UTF-8 with invalid
/// sequences replaced. The callback learns whether a line needed repair.
/// Stops with [`Error::Cancelled`] before the next line once `cancel` is set.
fn for_each_line<F>(path: &Path, cancel: &CancelToken, mut on_line: F) -> Result<()>
where
    F: FnMut(&str, bool) -> Result<()>,
{
    let mut reader = BufReader::new(File::open(path)?);
    let mut buffer = Vec::new();
    let mut first = true;

    loop {
        cancel.check()?;
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }

        let (line, repaired) = if first {
            first = false;
            UTF_8.decode_with_bom_removal(&buffer)
        } else {
            UTF_8.decode_without_bom_handling(&buffer)
        };
        on_line(&line, repaired)?;
    }
}

/// Files found under the input directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputSet {
    /// Files routed to a pipeline path, sorted by path.
    pub files: Vec<PathBuf>,
    /// Files with an unsupported extension.
    pub skipped: Vec<PathBuf>,
    /// Supported files refused because an earlier file already uses their
    /// output basename, as `(path, existing)`.
    pub collisions: Vec<(PathBuf, PathBuf)>,
}

impl InputSet {
    /// Failed outcomes for the refused inputs.
    pub fn collision_outcomes(&self) -> Vec<FileOutcome> {
        self.collisions
            .iter()
            .map(|(path, existing)| FileOutcome {
                path: path.clone(),
                result: Err(Error::OutputCollision {
                    path: path.clone(),
                    existing: existing.clone(),
                }),
            })
            .collect()
    }
}

/// Adds the refused inputs to `outcomes`, keeping walk order.
pub(crate) fn merge_collisions(outcomes: &mut Vec<FileOutcome>, inputs: &InputSet) {
    if inputs.collisions.is_empty() {
        return;
    }
    outcomes.extend(inputs.collision_outcomes());
    outcomes.sort_by(|a, b| a.path.cmp(&b.path));
}

/// Walks the input directory and classifies every file.
///
/// The output directory is not descended into when it lies inside the input
/// tree. Outputs are named after the file stem, so when two supported files
/// share one (`a/x.txt` and `b/x.txt`, or `x.txt` and `x.json`) only the
/// first in walk order is kept; the rest land in [`InputSet::collisions`].
pub fn collect_inputs(options: &PipelineOptions) -> Result<InputSet> {
    if !options.input_dir.is_dir() {
        return Err(Error::Config(format!(
            "input directory not found: {}",
            options.input_dir.display()
        )));
    }

    let mut inputs = InputSet::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    let walker = WalkDir::new(&options.input_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry.path() == options.output_dir.as_path())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        if classify_path(&path, options).is_none() {
            tracing::warn!(path = %path.display(), "skipping unsupported file type");
            inputs.skipped.push(path);
            continue;
        }

        let basename = basename_of(&path);
        if let Some(existing) = seen.get(&basename) {
            tracing::warn!(
                path = %path.display(),
                existing = %existing.display(),
                basename = %basename,
                "refusing input that shares an output basename"
            );
            inputs.collisions.push((path, existing.clone()));
            continue;
        }
        seen.insert(basename, path.clone());
        inputs.files.push(path);
    }

    Ok(inputs)
}

/// Cleans every supported file under `options.input_dir`.
///
/// Only setup problems (invalid options, unreadable stopwords, missing input
/// directory, uncreatable output directory) fail the run; per-file failures
/// are recorded in the summary. An input whose output basename is already
/// taken by an earlier file is not processed and is recorded as an
/// [`Error::OutputCollision`] failure.
pub fn run(options: PipelineOptions) -> Result<RunSummary> {
    let context = Arc::new(PipelineContext::new(options)?);
    run_with_context(context)
}

/// Like [`run`], reusing an already built context.
pub fn run_with_context(context: Arc<PipelineContext>) -> Result<RunSummary> {
    let options = context.options().clone();
    let inputs = collect_inputs(&options)?;
    fs::create_dir_all(&options.output_dir)?;

    let workers = if options.parallel {
        options.worker_count()
    } else {
        1
    };
    tracing::info!(
        files = inputs.files.len(),
        skipped = inputs.skipped.len(),
        collisions = inputs.collisions.len(),
        workers,
        "starting run"
    );

    let job_context = Arc::clone(&context);
    let mut outcomes = run_jobs(inputs.files.clone(), &options, move |path, cancel| {
        job_context.process_file_with_cancel(path, cancel)
    })?;
    merge_collisions(&mut outcomes, &inputs);

    let summary = RunSummary {
        outcomes,
        skipped: inputs.skipped,
    };
    tracing::info!(
        succeeded = summary.success_count(),
        failed = summary.failure_count(),
        outputs = summary.output_count(),
        "run complete"
    );
    Ok(summary)
}
