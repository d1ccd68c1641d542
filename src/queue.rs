//! The queue adapter façade.
//!
//! [`DynamicQueue`] ties the crate together. On the inbound path (`pop`) it
//! classifies the received body and rewrites foreign payloads into native
//! envelopes via the configured resolution strategy. On the outbound path
//! (`bulk`) it partitions serialized jobs into provider-sized batches and
//! dispatches them with bounded concurrency.
//!
//! ## Key components
//!
//! - [`DynamicQueue`]: The adapter, generic over client and resolver
//! - [`QueuedJob`]: Message wrapper handed to the job-processing runtime
//! - [`PopError`] / [`BulkError`]: Per-operation error types

use futures::{stream, StreamExt as _};
use tracing_error::SpanTrace;

use crate::{
    batch,
    envelope::{classify, create_payload, Classification, Job},
    resolve::{ResolveError, ResolveJob},
    transport::{BatchEntry, BatchResult, FailedEntry, QueueClient},
};

/// Maximum number of in-flight batch-send operations per `bulk` call.
///
/// Fixed by design: the cap applies per call, not across calls.
pub const CONCURRENCY: usize = 10;

/// Queue adapter translating between foreign payloads and native envelopes.
///
/// Generic parameters:
/// - `C`: Queue backend implementing [`QueueClient`]
/// - `R`: Resolution strategy implementing [`ResolveJob`]
///
/// Exactly one strategy is configured per adapter instance. The adapter
/// holds no mutable state; concurrent `pop` and `bulk` calls on the same
/// instance are independent.
pub struct DynamicQueue<C, R> {
    client: C,
    resolver: R,
    default_queue: String,
}

impl<C, R> DynamicQueue<C, R>
where
    C: QueueClient,
    R: ResolveJob,
{
    /// Create an adapter over a queue backend and a resolution strategy.
    pub fn new(client: C, resolver: R, default_queue: impl Into<String>) -> Self {
        Self {
            client,
            resolver,
            default_queue: default_queue.into(),
        }
    }

    /// Receive one message, translated into a runnable job message.
    ///
    /// An empty queue returns `Ok(None)`. A body already in the native
    /// envelope format passes through byte-for-byte; anything else is
    /// resolved by the configured strategy and rewritten. A failed `pop`
    /// never acknowledges the message; the transport's own visibility
    /// timeout governs redelivery.
    #[tracing::instrument(skip(self))]
    pub async fn pop(&self, queue: Option<&str>) -> Result<Option<QueuedJob>, PopError> {
        let queue = queue.unwrap_or(&self.default_queue);

        let Some(message) = self
            .client
            .receive_message(queue)
            .await
            .map_err(|e| PopError::receive(e.into()))?
        else {
            return Ok(None);
        };

        let parsed: serde_json::Value =
            serde_json::from_str(&message.body).map_err(PopError::decode)?;

        let body = match classify(&parsed) {
            Classification::Native => message.body,
            Classification::Foreign => {
                let job = self.resolver.resolve(&parsed)?;
                tracing::debug!(
                    command = job.name(),
                    "Rewrote foreign payload into a native envelope",
                );
                create_payload(job.as_ref()).map_err(PopError::encode)?
            }
        };

        Ok(Some(QueuedJob {
            queue: queue.to_owned(),
            message_id: message.message_id,
            receipt_handle: message.receipt_handle,
            receive_count: message.receive_count,
            body,
        }))
    }

    /// Dispatch many jobs as batched, concurrently issued send operations.
    ///
    /// Jobs are serialized in input order and partitioned under the batch
    /// limits (see [`batch`]). At most [`CONCURRENCY`] batch sends are in
    /// flight at any instant; the call returns only once every batch has
    /// completed. If any entry in any batch fails, the call fails with
    /// [`BulkErrorKind::BatchSendFailed`] carrying every failed entry.
    #[tracing::instrument(skip(self, jobs))]
    pub async fn bulk<I>(&self, jobs: I, queue: Option<&str>) -> Result<(), BulkError>
    where
        I: IntoIterator,
        I::Item: Job,
    {
        let queue = queue.unwrap_or(&self.default_queue);

        let mut payloads = Vec::new();
        for job in jobs {
            payloads.push(create_payload(&job).map_err(BulkError::encode)?);
        }

        let results: Vec<Result<BatchResult, tower::BoxError>> =
            stream::iter(batch::partition(payloads))
                .map(|payloads| {
                    let entries: Vec<BatchEntry> = payloads
                        .into_iter()
                        .map(|body| BatchEntry {
                            id: uuid::Uuid::new_v4().to_string(),
                            body,
                        })
                        .collect();
                    async move {
                        self.client
                            .send_message_batch(queue, entries)
                            .await
                            .map_err(Into::into)
                    }
                })
                .buffer_unordered(CONCURRENCY)
                .collect()
                .await;

        let batches = results.len();
        let mut failed = Vec::new();
        for result in results {
            failed.extend(result.map_err(BulkError::transport)?.failed);
        }

        if failed.is_empty() {
            tracing::debug!(batches, "All batches dispatched");
            Ok(())
        } else {
            tracing::error!(batches, failed = failed.len(), "Batch dispatch had failed entries");
            Err(BulkError::batch_send_failed(failed))
        }
    }
}

/// Message wrapper handed to the downstream job-processing runtime.
///
/// Carries the original transport metadata plus the (possibly rewritten)
/// native envelope body. Decoding `data.command` back into an executable
/// job is the runtime's concern, not this crate's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    /// Queue the message was received from.
    pub queue: String,
    /// Transport-assigned message id.
    pub message_id: String,
    /// Opaque handle for acknowledging or deleting the message.
    pub receipt_handle: Option<String>,
    /// Approximate number of times this message has been received.
    pub receive_count: u32,
    /// Native envelope body, ready for the job-processing runtime.
    pub body: String,
}

/// Error returned by [`DynamicQueue::pop`].
#[derive(Debug)]
pub struct PopError {
    context: SpanTrace,
    kind: PopErrorKind,
}

/// Pop error kinds.
#[derive(Debug)]
pub enum PopErrorKind {
    /// The transport failed to receive.
    Receive(tower::BoxError),
    /// The message body is not parseable JSON.
    Decode(serde_json::Error),
    /// The payload could not be resolved to a job.
    Resolve(ResolveError),
    /// The resolved job could not be serialized into an envelope.
    Encode(serde_json::Error),
}

impl PopError {
    fn receive(err: tower::BoxError) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: PopErrorKind::Receive(err),
        }
    }

    fn decode(err: serde_json::Error) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: PopErrorKind::Decode(err),
        }
    }

    fn encode(err: serde_json::Error) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: PopErrorKind::Encode(err),
        }
    }

    /// The error kind.
    pub fn kind(&self) -> &PopErrorKind {
        &self.kind
    }
}

impl From<ResolveError> for PopError {
    fn from(err: ResolveError) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: PopErrorKind::Resolve(err),
        }
    }
}

impl std::fmt::Display for PopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PopErrorKind::Receive(err) => writeln!(f, "Receive error: {err}"),
            PopErrorKind::Decode(err) => writeln!(f, "Decode error: {err}"),
            PopErrorKind::Resolve(err) => writeln!(f, "Resolve error: {err}"),
            PopErrorKind::Encode(err) => writeln!(f, "Encode error: {err}"),
        }?;
        self.context.fmt(f)
    }
}

impl std::error::Error for PopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            PopErrorKind::Receive(err) => Some(err.as_ref()),
            PopErrorKind::Decode(err) => Some(err),
            PopErrorKind::Resolve(err) => Some(err),
            PopErrorKind::Encode(err) => Some(err),
        }
    }
}

/// Error returned by [`DynamicQueue::bulk`].
#[derive(Debug)]
pub struct BulkError {
    context: SpanTrace,
    kind: BulkErrorKind,
}

/// Bulk error kinds.
#[derive(Debug)]
pub enum BulkErrorKind {
    /// A job could not be serialized into an envelope.
    Encode(serde_json::Error),
    /// A batch-send operation failed at the transport level.
    Transport(tower::BoxError),
    /// One or more entries across all batches were rejected.
    BatchSendFailed(Vec<FailedEntry>),
}

impl BulkError {
    fn encode(err: serde_json::Error) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: BulkErrorKind::Encode(err),
        }
    }

    fn transport(err: tower::BoxError) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: BulkErrorKind::Transport(err),
        }
    }

    fn batch_send_failed(failed: Vec<FailedEntry>) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: BulkErrorKind::BatchSendFailed(failed),
        }
    }

    /// The error kind.
    pub fn kind(&self) -> &BulkErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for BulkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            BulkErrorKind::Encode(err) => writeln!(f, "Encode error: {err}"),
            BulkErrorKind::Transport(err) => writeln!(f, "Transport error: {err}"),
            BulkErrorKind::BatchSendFailed(failed) => {
                writeln!(f, "{} batch entries failed to send", failed.len())
            }
        }?;
        self.context.fmt(f)
    }
}

impl std::error::Error for BulkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            BulkErrorKind::Encode(err) => Some(err),
            BulkErrorKind::Transport(err) => Some(err.as_ref()),
            BulkErrorKind::BatchSendFailed(_) => None,
        }
    }
}
