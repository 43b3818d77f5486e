//! # fetch-pipeline
//!
//! Bounded-concurrency URL fetching with a single persistence stage.
//!
//! A fixed pool of workers pulls targets from a work queue, performs one
//! time-limited request per target, classifies the outcome and hands a
//! [`ResultRecord`] to a dedicated writer, which appends one JSON line per
//! record to the output sink:
//!
//! ```text
//! targets → work queue → worker × N → sink queue → writer → results.jsonl
//! ```
//!
//! Failed fetches are data, not errors: a connection failure or timeout is
//! recorded with `status_code: 0`, and an HTTP error status is recorded as is.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetch_pipeline::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         workers: 5,
//!         output_path: "results.jsonl".into(),
//!         ..Default::default()
//!     };
//!
//!     let pipeline = Pipeline::new(config)?;
//!     let summary = pipeline
//!         .run(["https://example.com", "https://httpbin.org/status/404"])
//!         .await?;
//!
//!     println!("{} records, {} unreachable", summary.total, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Outcome classification
pub mod classifier;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Network fetchers
pub mod fetcher;
/// Pipeline orchestration
pub mod pipeline;
/// Work and sink queues
pub mod queue;
/// Core types and events
pub mod types;
/// Fetch worker loop
pub mod worker;
/// Output sink writer
mod writer;

// Re-export commonly used types
pub use classifier::{FetchOutcome, classify};
pub use config::Config;
pub use error::{Error, QueueError, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use pipeline::Pipeline;
pub use queue::{SinkQueue, TaskQueue, WorkQueue};
pub use types::{Event, ResultRecord, RunSummary, STATUS_UNREACHABLE};
pub use worker::WorkerState;

/// Fetch `urls` with default settings and write the records to `output_path`
///
/// # Example
///
/// ```no_run
/// # async fn example() -> fetch_pipeline::Result<()> {
/// let summary = fetch_pipeline::fetch_urls(
///     ["https://example.com", "https://nonexistent.url"],
///     "./results.jsonl",
/// )
/// .await?;
/// assert_eq!(summary.total, 2);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// See [`Pipeline::run`].
pub async fn fetch_urls<I, S>(
    urls: I,
    output_path: impl Into<std::path::PathBuf>,
) -> Result<RunSummary>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let config = Config {
        output_path: output_path.into(),
        ..Default::default()
    };
    Pipeline::new(config)?.run(urls).await
}
