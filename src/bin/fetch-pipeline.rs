//! fetch-pipeline CLI: fetch a list of URLs and write one JSON line per result.

use anyhow::Context as _;
use clap::Parser;
use fetch_pipeline::{Config, Pipeline};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "fetch-pipeline",
    about = "Fetch URLs with a fixed worker pool and record their status codes"
)]
struct Cli {
    /// URLs to fetch
    urls: Vec<String>,
    /// File with one URL per line (blank lines and '#' comments are skipped)
    #[arg(long, short)]
    input: Option<PathBuf>,
    /// Output JSON-lines file, truncated before the run
    #[arg(long, short, default_value = "./results.jsonl")]
    output: PathBuf,
    /// Number of fetch workers
    #[arg(long, short, default_value_t = 5)]
    workers: usize,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
    /// Bound the work and sink queues to this many buffered items
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// User-Agent header to send
    #[arg(long)]
    user_agent: Option<String>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn read_targets(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read input file '{}'", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut targets = cli.urls;
    if let Some(input) = &cli.input {
        targets.extend(read_targets(input).await?);
    }
    if targets.is_empty() {
        anyhow::bail!("no URLs given; pass them as arguments or with --input");
    }

    let config = Config {
        workers: cli.workers,
        request_timeout: Duration::from_secs(cli.timeout_secs),
        output_path: cli.output,
        queue_capacity: cli.queue_capacity,
        user_agent: cli.user_agent,
    };
    let output_path = config.output_path.clone();
    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;

    let summary = tokio::select! {
        result = pipeline.run(targets) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Received Ctrl-C, abandoning run");
            anyhow::bail!("interrupted");
        }
    };

    println!(
        "{} records written to {} ({} ok, {} HTTP errors, {} unreachable)",
        summary.total,
        output_path.display(),
        summary.succeeded,
        summary.http_errors,
        summary.failed
    );
    Ok(())
}
