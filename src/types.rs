//! Core types and events

use serde::{Deserialize, Serialize};
use std::io;

/// Status code recorded when no response was received (transport failure or timeout)
pub const STATUS_UNREACHABLE: u16 = 0;

/// Outcome of fetching one target, exactly one per input item
///
/// `status_code` is the HTTP status of the response, or
/// [`STATUS_UNREACHABLE`] when the transport failed or the request timed out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The target exactly as it was supplied to the pipeline
    pub url: String,
    /// HTTP status code, or 0 if the target could not be reached in time
    pub status_code: u16,
}

impl ResultRecord {
    /// Create a record for `url` with the given status
    pub fn new(url: impl Into<String>, status_code: u16) -> Self {
        Self {
            url: url.into(),
            status_code,
        }
    }

    /// Whether a response was received at all
    pub fn is_reachable(&self) -> bool {
        self.status_code != STATUS_UNREACHABLE
    }

    /// Encode the record as one newline-terminated JSON line
    ///
    /// Separators follow the `", "` / `": "` convention so a record reads
    /// `{"url": "https://example.com", "status_code": 200}`. Anything outside
    /// printable ASCII is written as a `\uXXXX` escape, so lines are pure
    /// ASCII whatever the target contains.
    pub fn to_json_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.url.len() + 40);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

/// JSON formatter emitting a space after every `,` and `:` and escaping
/// non-ASCII text
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and control characters never reach this method,
    // serde_json routes them through `write_char_escape`.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Tally of persisted records for one pipeline run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Records written to the sink
    pub total: usize,
    /// Records with a status below 400
    pub succeeded: usize,
    /// Records with a status of 400 or above
    pub http_errors: usize,
    /// Records with status 0 (unreachable or timed out)
    pub failed: usize,
}

impl RunSummary {
    /// Count one persisted record
    pub fn record(&mut self, record: &ResultRecord) {
        self.total += 1;
        match record.status_code {
            STATUS_UNREACHABLE => self.failed += 1,
            400.. => self.http_errors += 1,
            _ => self.succeeded += 1,
        }
    }
}

/// Event emitted during a pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Workers and writer are running and the work queue is being fed
    Started {
        /// Number of targets in this run
        targets: usize,
        /// Number of fetch workers
        workers: usize,
    },

    /// A worker classified a target and handed the record to the writer
    Fetched {
        /// Index of the worker that fetched the target
        worker: usize,
        /// The classified record
        record: ResultRecord,
        /// Wall time spent on the request in milliseconds
        elapsed_ms: u64,
    },

    /// The writer appended a record to the output sink
    Persisted {
        /// The record that was written
        record: ResultRecord,
    },

    /// Both queues drained and every task was shut down
    Finished {
        /// Final tally
        summary: RunSummary,
    },
}
