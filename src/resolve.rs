//! Resolution strategies for foreign message payloads.
//!
//! When [`classify`](crate::envelope::classify) routes a body to resolution,
//! one of two interchangeable strategies turns the payload into a [`Job`]:
//!
//! - [`ClassMap`]: maps a `jobClassId` field to a registered job factory
//! - [`HandlerRegistry`]: extracts a handler id via a pluggable discoverer
//!   and delegates construction to the registered handler
//!
//! Exactly one strategy is configured per adapter instance; both implement
//! [`ResolveJob`]. Registries are built at startup and read-only afterwards,
//! so resolution never takes a lock.

mod class_map;
mod handler;

use tracing_error::SpanTrace;

use crate::envelope::Job;

pub use class_map::{ClassMap, JobFactory};
pub use handler::{HandlerRegistry, JobHandler};

/// Strategy turning a foreign payload into a [`Job`].
pub trait ResolveJob: Send + Sync {
    /// Resolve the parsed message body into a job instance.
    fn resolve(&self, payload: &serde_json::Value) -> Result<Box<dyn Job>, ResolveError>;
}

/// Error returned when a payload cannot be resolved to a job.
///
/// Captures a tracing span backtrace alongside the error kind, matching the
/// crate's other error types.
#[derive(Debug)]
pub struct ResolveError {
    context: SpanTrace,
    kind: ResolveErrorKind,
}

/// Resolution error kinds.
#[derive(Debug)]
pub enum ResolveErrorKind {
    /// The class-map strategy found no job type for the payload.
    InvalidMapping(String),
    /// The discoverer produced no handler id.
    HandlerNotDefined,
    /// A handler id was discovered but nothing is registered under it.
    HandlerNotFound(String),
    /// The resolved factory or handler failed to construct the job.
    Handler(tower::BoxError),
}

impl ResolveError {
    pub(crate) fn invalid_mapping(detail: impl Into<String>) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ResolveErrorKind::InvalidMapping(detail.into()),
        }
    }

    pub(crate) fn handler_not_defined() -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ResolveErrorKind::HandlerNotDefined,
        }
    }

    pub(crate) fn handler_not_found(id: impl Into<String>) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ResolveErrorKind::HandlerNotFound(id.into()),
        }
    }

    pub(crate) fn handler(err: tower::BoxError) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ResolveErrorKind::Handler(err),
        }
    }

    /// The error kind.
    pub fn kind(&self) -> &ResolveErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ResolveErrorKind::InvalidMapping(detail) => writeln!(f, "{detail}"),
            ResolveErrorKind::HandlerNotDefined => writeln!(f, "Handler not defined"),
            ResolveErrorKind::HandlerNotFound(id) => {
                writeln!(f, "Handler not found for ID \"{id}\"")
            }
            ResolveErrorKind::Handler(err) => writeln!(f, "Handler error: {err}"),
        }?;
        self.context.fmt(f)
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ResolveErrorKind::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
