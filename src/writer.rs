//! Single writer for the output sink.
//!
//! The writer is the only task that appends to the sink, so the sink needs no
//! lock. Each record becomes one JSON line, flushed before the record is
//! marked done: once the sink queue's `join` returns, every record is in the
//! sink in the order the writer received it.
//!
//! A write that fails part way leaves a torn line behind. The next record is
//! then prefixed with a newline so every later line stays self-delimited.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, QueueError, Result};
use crate::queue::SinkQueue;
use crate::types::{Event, ResultRecord, RunSummary};

/// Parameters for the writer task
pub(crate) struct WriterContext<W> {
    pub(crate) sink_queue: Arc<SinkQueue>,
    pub(crate) output: W,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

/// What the writer persisted, plus the sink handed back to the caller
pub(crate) struct WriterReport<W> {
    pub(crate) summary: RunSummary,
    pub(crate) output: W,
    /// First append failure, if any; later records were still attempted
    pub(crate) first_error: Option<Error>,
}

/// Run the writer until cancelled
///
/// A failed append is logged and remembered, and the record is still marked
/// done so the orchestrator's `join` cannot hang on a broken sink.
pub(crate) async fn run_writer<W>(ctx: WriterContext<W>) -> Result<WriterReport<W>>
where
    W: AsyncWrite + Unpin,
{
    let WriterContext {
        sink_queue,
        mut output,
        event_tx,
        cancel_token,
    } = ctx;

    let mut summary = RunSummary::default();
    let mut first_error = None;
    let mut torn = false;

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            item = sink_queue.get() => match item {
                Ok(record) => record,
                Err(QueueError::Closed) => break,
                Err(e) => return Err(e.into()),
            },
        };

        match append_record(&mut output, &record, &mut torn).await {
            Ok(()) => {
                summary.record(&record);
                tracing::debug!(
                    url = %record.url,
                    status_code = record.status_code,
                    "record persisted"
                );
                event_tx.send(Event::Persisted { record }).ok();
            }
            Err(e) => {
                tracing::error!(url = %record.url, error = %e, "failed to append record");
                first_error.get_or_insert(e);
            }
        }

        sink_queue.mark_done()?;
    }

    if let Err(e) = output.flush().await {
        first_error.get_or_insert(e.into());
    }

    tracing::debug!(records = summary.total, "writer stopped");

    Ok(WriterReport {
        summary,
        output,
        first_error,
    })
}

/// Append one encoded record and flush it
///
/// `torn` is set when a failed write left part of a line in the sink, and
/// cleared once a newline has been written after it.
async fn append_record<W>(
    output: &mut W,
    record: &ResultRecord,
    torn: &mut bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = record.to_json_line()?;
    let prefix = usize::from(*torn);
    if *torn {
        line.insert(0, b'\n');
    }

    let mut written = 0;
    while written < line.len() {
        let result = match output.write(&line[written..]).await {
            Ok(0) => Err(std::io::Error::from(std::io::ErrorKind::WriteZero)),
            Ok(n) => {
                written += n;
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        if written > 0 {
            *torn = written > prefix;
        }
        return result.map_err(Error::from);
    }
    *torn = false;

    output.flush().await?;
    Ok(())
}
