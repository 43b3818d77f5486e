//! Network collaborator used by fetch workers.
//!
//! [`Fetcher`] is the seam between the worker pool and the network. The
//! production implementation is [`HttpFetcher`], a thin wrapper around a
//! shared `reqwest::Client` whose connection pool is reused by every worker.

use std::time::Duration;

use crate::classifier::FetchOutcome;
use crate::config::Config;
use crate::error::{Error, Result};

/// Performs one time-limited request per target
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Reject targets this fetcher can never service
    ///
    /// Called by the pipeline for every target before any task starts, so
    /// misuse fails the run up front instead of degrading item by item.
    fn validate(&self, _target: &str) -> Result<()> {
        Ok(())
    }

    /// Issue a single request against `target`
    ///
    /// Must return within the configured timeout and must not retry.
    async fn fetch(&self, target: &str) -> FetchOutcome;
}

/// HTTP(S) GET fetcher backed by `reqwest`
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be constructed
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.workers);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
            timeout: config.request_timeout,
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Per-request timeout applied to every fetch
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    fn validate(&self, target: &str) -> Result<()> {
        let unsupported = |reason: String| Error::UnsupportedTarget {
            target: target.to_string(),
            reason,
        };

        let url = url::Url::parse(target).map_err(|e| unsupported(format!("invalid URL: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(unsupported(format!("scheme '{other}' is not supported"))),
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(unsupported("URL has no host".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, target: &str) -> FetchOutcome {
        let request = self.client.get(target).timeout(self.timeout);

        // reqwest enforces the timeout itself; the outer guard also covers
        // time spent before the request is dispatched.
        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => FetchOutcome::Response {
                status: response.status().as_u16(),
            },
            Ok(Err(e)) => e.into(),
            Err(_) => FetchOutcome::TimedOut,
        }
    }
}
