//! Bounded worker pool with a per-file timeout guard.
//!
//! Files are spread over a rayon pool sized by
//! [`PipelineOptions::worker_count`]. Each file runs on its own guard thread;
//! the pool worker waits on a channel for at most the configured timeout.
//! When the limit passes it sets the file's [`CancelToken`] and joins the
//! guard thread before taking the next file, so no more than `worker_count`
//! jobs ever run at once. Cancellation is cooperative: jobs check the token
//! between lines, records and output writes.

use crate::error::{Error, Result};
use crate::model::{FileOutcome, FileReport};
use crate::pipeline_options::PipelineOptions;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Shared flag telling a running job to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`Error::Cancelled`] once the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs `job` and waits for it for at most `timeout`.
///
/// Without a timeout the job runs on the calling thread with a token that is
/// never set. With one, the job runs on a guard thread; on expiry the token is
/// cancelled and this call blocks until the guard thread has returned. A job
/// that stopped because of the limit is reported as [`Error::Timeout`]. A
/// panicking job is reported as [`Error::WorkerPanicked`] in both cases.
pub fn run_with_timeout<T, F>(path: &Path, timeout: Option<Duration>, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
{
    let token = CancelToken::new();
    let Some(limit) = timeout else {
        return panic::catch_unwind(AssertUnwindSafe(|| job(&token))).unwrap_or_else(|_| {
            Err(Error::WorkerPanicked {
                path: path.to_path_buf(),
            })
        });
    };

    let (tx, rx) = mpsc::channel();
    let job_token = token.clone();
    let guard = thread::Builder::new()
        .name(format!("clean-{}", crate::detect::basename_of(path)))
        .spawn(move || {
            let _ = tx.send(job(&job_token));
        })?;

    let panicked = || Error::WorkerPanicked {
        path: path.to_path_buf(),
    };

    match rx.recv_timeout(limit) {
        Ok(result) => {
            let _ = guard.join();
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            token.cancel();
            tracing::debug!(path = %path.display(), "time limit reached, waiting for job to stop");
            if guard.join().is_err() {
                return Err(panicked());
            }
            match rx.try_recv() {
                // Finished on its own while the token was being set.
                Ok(Ok(value)) => Ok(value),
                _ => Err(Error::Timeout {
                    path: path.to_path_buf(),
                    after: limit,
                }),
            }
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = guard.join();
            Err(panicked())
        }
    }
}

/// Processes every file with `job`, concurrently when the options allow it.
///
/// Outcomes come back in input order. Per-file failures are recorded in the
/// outcomes and never stop the other files. `job` receives the file's cancel
/// token and should return promptly once it is set.
pub fn run_jobs<F>(files: Vec<PathBuf>, options: &PipelineOptions, job: F) -> Result<Vec<FileOutcome>>
where
    F: Fn(&Path, &CancelToken) -> Result<FileReport> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    let timeout = options.file_timeout();

    let run_one = |path: &PathBuf| -> FileOutcome {
        let started = Instant::now();
        let job = Arc::clone(&job);
        let owned = path.clone();
        let result = run_with_timeout(path, timeout, move |cancel| job(&owned, cancel));

        match &result {
            Ok(report) => tracing::info!(
                path = %path.display(),
                outputs = report.outputs.len(),
                skipped_units = report.skipped_units,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "processed file"
            ),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "file failed"),
        }

        FileOutcome {
            path: path.clone(),
            result,
        }
    };

    if !options.parallel || files.len() <= 1 {
        return Ok(files.iter().map(run_one).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.worker_count())
        .thread_name(|i| format!("corpus-worker-{i}"))
        .build()
        .map_err(|e| Error::Config(format!("failed to start worker pool: {e}")))?;

    Ok(pool.install(|| files.par_iter().map(run_one).collect()))
}
