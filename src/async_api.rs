//! Async API for running the pipeline from a Tokio application.
//!
//! Enable the `async` feature to use these APIs:
//!
//! ```toml
//! [dependencies]
//! corpus-clean = { version = "0.1", features = ["async"] }
//! ```
//!
//! Cleaning is CPU-bound, so every file runs in a blocking task. At most
//! [`PipelineOptions::worker_count`] files are in flight at once. A file that
//! outlives its time limit is cancelled and keeps its permit until the
//! blocking task has actually returned.

use crate::error::{Error, Result};
use crate::model::{FileOutcome, FileReport, RunSummary};
use crate::pipeline::{collect_inputs, merge_collisions, PipelineContext};
use crate::pipeline_options::PipelineOptions;
use crate::worker::CancelToken;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

fn join_error(path: &Path, err: JoinError) -> Error {
    if err.is_panic() {
        Error::WorkerPanicked {
            path: path.to_path_buf(),
        }
    } else {
        Error::Io(std::io::Error::other(err.to_string()))
    }
}

/// Asynchronously cleans every supported file under `options.input_dir`.
///
/// Options are validated and stopwords loaded before the input tree is
/// walked.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> corpus_clean::Result<()> {
/// use corpus_clean::PipelineOptions;
///
/// let options = PipelineOptions::default()
///     .with_input_dir("./raw")
///     .with_output_dir("./cleaned");
/// let summary = corpus_clean::async_api::clean_directory(options).await?;
/// println!("{} outputs", summary.output_count());
/// # Ok(())
/// # }
/// ```
pub async fn clean_directory(options: PipelineOptions) -> Result<RunSummary> {
    let setup = tokio::task::spawn_blocking(move || -> Result<_> {
        let context = PipelineContext::new(options)?;
        let inputs = collect_inputs(context.options())?;
        Ok((inputs, context))
    });
    let (inputs, context) = setup
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))??;

    tokio::fs::create_dir_all(&context.options().output_dir).await?;

    let options = context.options().clone();
    let context = Arc::new(context);
    let mut outcomes = run_jobs(inputs.files.clone(), &options, move |path, cancel| {
        context.process_file_with_cancel(path, cancel)
    })
    .await;
    merge_collisions(&mut outcomes, &inputs);

    Ok(RunSummary {
        outcomes,
        skipped: inputs.skipped,
    })
}

/// Runs `job` for every file as a blocking task, at most
/// [`PipelineOptions::worker_count`] at a time.
///
/// Outcomes come back in input order. `job` receives the file's cancel token
/// and should return promptly once it is set.
pub async fn run_jobs<F>(files: Vec<PathBuf>, options: &PipelineOptions, job: F) -> Vec<FileOutcome>
where
    F: Fn(&Path, &CancelToken) -> Result<FileReport> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let workers = if options.parallel {
        options.worker_count()
    } else {
        1
    };
    let permits = Arc::new(Semaphore::new(workers));
    let timeout = options.file_timeout();

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let job = Arc::clone(&job);
        let permits = Arc::clone(&permits);
        let task_path = path.clone();

        handles.push((
            path,
            tokio::spawn(async move { run_one(job, task_path, permits, timeout).await }),
        ));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(join_error(&path, err)),
        };
        if let Err(err) = &result {
            tracing::warn!(path = %path.display(), error = %err, "file failed");
        }
        outcomes.push(FileOutcome { path, result });
    }
    outcomes
}

async fn run_one<F>(
    job: Arc<F>,
    path: PathBuf,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
) -> Result<FileReport>
where
    F: Fn(&Path, &CancelToken) -> Result<FileReport> + Send + Sync + 'static,
{
    // Held until the blocking task has returned, timed out or not.
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| Error::Config(e.to_string()))?;

    let cancel = CancelToken::new();
    let job_cancel = cancel.clone();
    let job_path = path.clone();
    let mut task = tokio::task::spawn_blocking(move || job(&job_path, &job_cancel));

    let Some(limit) = timeout else {
        return task.await.map_err(|e| join_error(&path, e))?;
    };

    match tokio::time::timeout(limit, &mut task).await {
        Ok(joined) => joined.map_err(|e| join_error(&path, e))?,
        Err(_) => {
            cancel.cancel();
            tracing::debug!(path = %path.display(), "time limit reached, waiting for job to stop");
            match task.await {
                Ok(Ok(report)) => Ok(report),
                Ok(Err(_)) => Err(Error::Timeout { path, after: limit }),
                Err(err) => Err(join_error(&path, err)),
            }
        }
    }
}

/// Asynchronously cleans a single file into `options.output_dir`.
pub async fn clean_file(path: impl AsRef<Path>, options: PipelineOptions) -> Result<FileReport> {
    let path = path.as_ref().to_path_buf();
    let job_path = path.clone();
    tokio::task::spawn_blocking(move || crate::clean_file(&job_path, options))
        .await
        .map_err(|e| join_error(&path, e))?
}
