#![doc = include_str!("../README.md")]

pub mod batch;
pub mod envelope;
pub mod queue;
pub mod resolve;
pub mod transport;

#[doc(inline)]
pub use envelope::{classify, create_payload, Classification, Envelope, EnvelopeData, Job};

#[doc(inline)]
pub use queue::{BulkError, BulkErrorKind, DynamicQueue, PopError, PopErrorKind, QueuedJob};

#[doc(inline)]
pub use resolve::{ClassMap, HandlerRegistry, JobHandler, ResolveError, ResolveErrorKind, ResolveJob};

#[doc(inline)]
pub use transport::{BatchEntry, BatchResult, FailedEntry, QueueClient, ReceivedMessage};
