//! Outcome classification.
//!
//! Every fetch ends in one of three ways: a response with a status code, a
//! protocol-level error that still carries a status code, or no response at
//! all (transport failure or timeout). [`classify`] folds all of them into a
//! [`ResultRecord`]; nothing else in the crate looks at outcomes.

use crate::types::{ResultRecord, STATUS_UNREACHABLE};

/// How a single request ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A response was received
    Response {
        /// HTTP status code of the response
        status: u16,
    },

    /// The protocol layer rejected a response after its status was read
    ProtocolError {
        /// Status code carried by the rejected response
        status: u16,
        /// Description of the protocol failure
        reason: String,
    },

    /// Connection refused, DNS failure, reset, or any other transport error
    TransportFailure {
        /// Description of the transport failure
        reason: String,
    },

    /// The per-request timeout expired before a response arrived
    TimedOut,
}

impl FetchOutcome {
    /// Status code carried by the outcome, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchOutcome::Response { status } | FetchOutcome::ProtocolError { status, .. } => {
                Some(*status)
            }
            FetchOutcome::TransportFailure { .. } | FetchOutcome::TimedOut => None,
        }
    }
}

impl From<reqwest::Error> for FetchOutcome {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchOutcome::ProtocolError {
                status: status.as_u16(),
                reason: err.to_string(),
            }
        } else if err.is_timeout() {
            FetchOutcome::TimedOut
        } else {
            FetchOutcome::TransportFailure {
                reason: err.to_string(),
            }
        }
    }
}

/// Map an outcome for `target` onto a result record
pub fn classify(target: &str, outcome: &FetchOutcome) -> ResultRecord {
    ResultRecord::new(target, outcome.status().unwrap_or(STATUS_UNREACHABLE))
}
