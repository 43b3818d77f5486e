//! Mock HTTP targets and pipeline builders

use std::path::PathBuf;
use std::time::Duration;
use fetch_pipeline::{Config, Pipeline};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Delay used for targets that must outlast the request timeout
pub const SLOW_RESPONSE_DELAY: Duration = Duration::from_secs(5);

/// Request timeout used by test pipelines
pub const TEST_REQUEST_TIMEOUT: Duration = Duration::from_millis(300);

/// Mount a GET route answering `status`, expected to be hit exactly once
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a GET route that answers only after [`SLOW_RESPONSE_DELAY`]
pub async fn mount_slow(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_delay(SLOW_RESPONSE_DELAY))
        .mount(server)
        .await;
}

/// A local URL nobody is listening on
pub fn unreachable_url() -> String {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("local addr").port()
    };
    format!("http://127.0.0.1:{port}/unreachable")
}

/// Build a pipeline writing into a fresh temp dir
///
/// Returns the pipeline, the output path and the temp dir (which must be kept alive).
pub fn create_test_pipeline(workers: usize) -> (Pipeline, PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let output_path = temp_dir.path().join("results.jsonl");

    let config = Config {
        workers,
        request_timeout: TEST_REQUEST_TIMEOUT,
        output_path: output_path.clone(),
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).expect("valid test config");

    (pipeline, output_path, temp_dir)
}
