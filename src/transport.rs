//! Queue transport abstraction and backends.
//!
//! The adapter never talks to a broker directly; it goes through
//! [`QueueClient`], which exposes the two primitives the adapter needs:
//! receive one message and send one batch. Authentication, retries, and
//! visibility timeouts all live behind this trait.
//!
//! ## Key components
//!
//! - [`QueueClient`]: Trait implemented by concrete queue backends
//! - [`ReceivedMessage`]: Raw message plus transport metadata
//! - [`BatchEntry`] / [`BatchResult`]: Batch-send request and outcome
//! - [`InMemory`]: Shared-state backend for tests and local pipelines

mod inmemory;

pub use inmemory::InMemory;

/// Trait implemented by concrete queue backends.
#[async_trait::async_trait]
pub trait QueueClient: Send + Sync {
    /// Backend-specific error type.
    type Error: Into<tower::BoxError>;

    /// Receive at most one message from the queue.
    ///
    /// An empty queue is `Ok(None)`, never an error. Implementations should
    /// request the approximate-receive-count attribute so redelivery is
    /// visible downstream.
    async fn receive_message(&self, queue: &str) -> Result<Option<ReceivedMessage>, Self::Error>;

    /// Send one batch of entries as a single network operation.
    ///
    /// The returned [`BatchResult`] must account for every submitted entry,
    /// either as accepted or as failed.
    async fn send_message_batch(
        &self,
        queue: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResult, Self::Error>;
}

/// A message as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Transport-assigned message id.
    pub message_id: String,
    /// Opaque handle used to acknowledge or delete the message.
    pub receipt_handle: Option<String>,
    /// Approximate number of times this message has been received.
    pub receive_count: u32,
    /// The raw message body.
    pub body: String,
}

/// One entry of a batch-send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Caller-assigned id, unique within the batch.
    pub id: String,
    /// Serialized message body.
    pub body: String,
}

/// Per-batch outcome of a batch-send operation.
///
/// Every submitted entry appears in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Ids of entries the backend accepted.
    pub successful: Vec<String>,
    /// Entries the backend rejected.
    pub failed: Vec<FailedEntry>,
}

/// A batch entry the backend failed to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    /// Id of the failed entry.
    pub id: String,
    /// Backend-supplied failure reason.
    pub reason: String,
}

impl std::fmt::Display for FailedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {}: {}", self.id, self.reason)
    }
}
