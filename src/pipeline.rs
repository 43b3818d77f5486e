//! Pipeline orchestrator.
//!
//! One run: validate every target, truncate the sink, start `N` fetch
//! workers and one writer, feed the work queue, then shut down in order:
//!
//! 1. `join` the work queue (every target fetched and published)
//! 2. cancel the workers
//! 3. `join` the sink queue (every record persisted)
//! 4. cancel the writer
//!
//! The writer must only be cancelled after step 3, otherwise records still
//! in the sink queue would be dropped. Both queues are created per run and
//! discarded with it.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::queue::{SinkQueue, WorkQueue};
use crate::types::{Event, RunSummary};
use crate::worker::{WorkerContext, run_fetch_worker};
use crate::writer::{WriterContext, run_writer};

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Bounded-concurrency fetch pipeline (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Pipeline {
    /// Create a pipeline that fetches over HTTP(S)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings, or [`Error::Network`]
    /// if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a pipeline driven by a custom [`Fetcher`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            event_tx,
        })
    }

    /// Subscribe to run events
    ///
    /// Slow subscribers may observe `RecvError::Lagged`; the pipeline never
    /// waits for them.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration this pipeline was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch every target and write one record per target to the configured
    /// output path
    ///
    /// The output file is created, or truncated, only after every target has
    /// passed validation.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedTarget`] if any target is rejected by the fetcher
    /// - [`Error::Io`] if the output file cannot be created or appended to
    /// - [`Error::TaskFailed`] if a worker or the writer dies
    pub async fn run<I, S>(&self, targets: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = self.validate_targets(targets)?;

        let path = &self.config.output_path;
        let output = tokio::fs::File::create(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create output file '{}': {}", path.display(), e),
            ))
        })?;

        let (summary, _output) = self.drive(targets, output).await?;
        Ok(summary)
    }

    /// Like [`run`](Self::run), but append records to `output` and hand it
    /// back once the run completes
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_to_writer<I, S, W>(&self, targets: I, output: W) -> Result<(RunSummary, W)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let targets = self.validate_targets(targets)?;
        self.drive(targets, output).await
    }

    fn validate_targets<I, S>(&self, targets: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        for target in &targets {
            self.fetcher.validate(target)?;
        }
        Ok(targets)
    }

    async fn drive<W>(&self, targets: Vec<String>, output: W) -> Result<(RunSummary, W)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let worker_count = self.config.workers;
        let target_count = targets.len();
        tracing::info!(
            targets = target_count,
            workers = worker_count,
            timeout_ms = self.config.request_timeout.as_millis() as u64,
            "Starting fetch pipeline"
        );

        let work_queue = Arc::new(WorkQueue::with_capacity(self.config.queue_capacity));
        let sink_queue = Arc::new(SinkQueue::with_capacity(self.config.queue_capacity));

        // Dropping this run early (e.g. the caller is aborted) cancels every task
        let shutdown = CancellationToken::new();
        let _shutdown_guard = shutdown.clone().drop_guard();
        let workers_token = shutdown.child_token();
        let writer_token = shutdown.child_token();

        let mut writer = tokio::spawn(run_writer(WriterContext {
            sink_queue: Arc::clone(&sink_queue),
            output,
            event_tx: self.event_tx.clone(),
            cancel_token: writer_token.clone(),
        }));

        let mut workers = JoinSet::new();
        for index in 0..worker_count {
            workers.spawn(run_fetch_worker(WorkerContext {
                index,
                work_queue: Arc::clone(&work_queue),
                sink_queue: Arc::clone(&sink_queue),
                fetcher: Arc::clone(&self.fetcher),
                event_tx: self.event_tx.clone(),
                cancel_token: workers_token.clone(),
            }));
        }

        self.event_tx
            .send(Event::Started {
                targets: target_count,
                workers: worker_count,
            })
            .ok();

        // Feed and drain the work queue. A worker can only finish before
        // cancellation by failing, which would leave items unsettled forever.
        let fetched = async {
            for target in targets {
                work_queue.put(target).await?;
            }
            work_queue.join().await;
            Ok::<(), Error>(())
        };
        // A dead writer leaves workers parked on a full sink queue, so it is
        // watched here as well.
        tokio::select! {
            result = fetched => result?,
            Some(exited) = workers.join_next() => {
                return Err(exited_early("fetch worker", exited));
            }
            exited = &mut writer => {
                return Err(exited_early("writer", exited));
            }
        }
        tracing::debug!("Work queue drained, stopping fetch workers");

        workers_token.cancel();
        let joined = async {
            let mut fetched_total = 0;
            while let Some(result) = workers.join_next().await {
                let report = result??;
                tracing::trace!(
                    worker = report.index,
                    fetched = report.fetched,
                    state = %report.final_state,
                    "fetch worker joined"
                );
                fetched_total += report.fetched;
            }
            Ok::<usize, Error>(fetched_total)
        };
        let fetched_total = tokio::select! {
            result = joined => result?,
            exited = &mut writer => {
                return Err(exited_early("writer", exited));
            }
        };
        work_queue.close();

        tokio::select! {
            _ = sink_queue.join() => {}
            exited = &mut writer => {
                return Err(exited_early("writer", exited));
            }
        }
        tracing::debug!("Sink queue drained, stopping writer");

        writer_token.cancel();
        let report = writer.await??;
        sink_queue.close();

        match report.first_error {
            None => {}
            Some(Error::Io(e)) => {
                return Err(Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to append to output sink: {}", e),
                )));
            }
            Some(e) => return Err(e),
        }

        let summary = report.summary;
        tracing::info!(
            fetched = fetched_total,
            total = summary.total,
            succeeded = summary.succeeded,
            http_errors = summary.http_errors,
            failed = summary.failed,
            "Fetch pipeline finished"
        );
        self.event_tx.send(Event::Finished { summary }).ok();

        Ok((summary, report.output))
    }
}

/// Turn the result of a task that stopped before being cancelled into an error
fn exited_early<T>(role: &str, result: std::result::Result<Result<T>, JoinError>) -> Error {
    match result {
        Err(join_err) => join_err.into(),
        Ok(Err(e)) => e,
        Ok(Ok(_)) => Error::TaskFailed(format!("{role} stopped before its queue drained")),
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
