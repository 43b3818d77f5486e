//! Basic fetch example
//!
//! Fetches a reachable page, a page that answers 404 and a host that does not
//! resolve, then prints every event and the final summary.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example basic_fetch
//! ```

use fetch_pipeline::{Config, Event, Pipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config {
        output_path: "results.jsonl".into(),
        ..Default::default()
    };
    let pipeline = Pipeline::new(config)?;

    let mut events = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Fetched { worker, record, elapsed_ms } => {
                    println!(
                        "worker {} fetched {} -> {} in {}ms",
                        worker, record.url, record.status_code, elapsed_ms
                    );
                }
                Event::Finished { summary } => {
                    println!("finished: {:?}", summary);
                }
                _ => {}
            }
        }
    });

    let summary = pipeline
        .run([
            "https://example.com",
            "https://httpbin.org/status/404",
            "https://nonexistent.url",
        ])
        .await?;

    println!(
        "{} records, {} ok, {} HTTP errors, {} unreachable",
        summary.total, summary.succeeded, summary.http_errors, summary.failed
    );
    Ok(())
}
