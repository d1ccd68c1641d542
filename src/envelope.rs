//! Native job-envelope format, body classification, and payload rewriting.
//!
//! The downstream job-processing runtime only understands one wire format:
//! a JSON object whose nested `data` object carries both `commandName` and
//! `command`. Everything in this module exists to get a message body into
//! that shape.
//!
//! ## Key components
//!
//! - [`Job`]: Contract implemented by dispatchable jobs
//! - [`Envelope`]: The native wire format
//! - [`classify`]: Decides whether a received body is already native
//! - [`create_payload`]: Serializes a resolved job into an envelope string

use serde::{Deserialize, Serialize};

/// Contract implemented by dispatchable jobs.
///
/// A job only has to say what it is called and how it serializes; the
/// adapter takes care of wrapping it into an [`Envelope`]. The remaining
/// methods are tuning knobs copied verbatim into the envelope and default
/// to "unset".
pub trait Job: Send + Sync {
    /// Name recorded as `data.commandName` and `displayName`.
    fn name(&self) -> &str;

    /// Serialized job instance recorded as `data.command`.
    fn command(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Maximum number of processing attempts, if the job bounds them.
    fn max_tries(&self) -> Option<u32> {
        None
    }

    /// Maximum number of unhandled exceptions before the job is abandoned.
    fn max_exceptions(&self) -> Option<u32> {
        None
    }

    /// Per-attempt timeout in seconds.
    fn timeout(&self) -> Option<u64> {
        None
    }

    /// Delivery delay in seconds.
    fn delay(&self) -> Option<u64> {
        None
    }
}

impl<J: Job + ?Sized> Job for &J {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn command(&self) -> Result<serde_json::Value, serde_json::Error> {
        (**self).command()
    }

    fn max_tries(&self) -> Option<u32> {
        (**self).max_tries()
    }

    fn max_exceptions(&self) -> Option<u32> {
        (**self).max_exceptions()
    }

    fn timeout(&self) -> Option<u64> {
        (**self).timeout()
    }

    fn delay(&self) -> Option<u64> {
        (**self).delay()
    }
}

impl<J: Job + ?Sized> Job for Box<J> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn command(&self) -> Result<serde_json::Value, serde_json::Error> {
        (**self).command()
    }

    fn max_tries(&self) -> Option<u32> {
        (**self).max_tries()
    }

    fn max_exceptions(&self) -> Option<u32> {
        (**self).max_exceptions()
    }

    fn timeout(&self) -> Option<u64> {
        (**self).timeout()
    }

    fn delay(&self) -> Option<u64> {
        (**self).delay()
    }
}

/// The native job-envelope wire format.
///
/// Only `data` is interpreted by this crate; the remaining fields are
/// carried for the job-processing runtime and stay `None` unless the job
/// overrides the corresponding [`Job`] accessor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub uuid: String,
    pub display_name: String,
    pub job_class: Option<String>,
    pub max_tries: Option<u32>,
    pub max_exceptions: Option<u32>,
    pub delay: Option<u64>,
    pub timeout: Option<u64>,
    pub timeout_at: Option<i64>,
    pub data: EnvelopeData,
}

/// The `data` object of an [`Envelope`]: the only part the adapter reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    pub command_name: String,
    pub command: serde_json::Value,
}

impl Envelope {
    /// Wrap a resolved job into a fresh envelope.
    ///
    /// Each envelope receives a new random `uuid`; two envelopes wrapping
    /// the same job are distinct messages.
    pub fn wrap<J: Job + ?Sized>(job: &J) -> Result<Self, serde_json::Error> {
        let name = job.name().to_owned();
        Ok(Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            display_name: name.clone(),
            job_class: Some(name.clone()),
            max_tries: job.max_tries(),
            max_exceptions: job.max_exceptions(),
            delay: job.delay(),
            timeout: job.timeout(),
            timeout_at: None,
            data: EnvelopeData {
                command_name: name,
                command: job.command()?,
            },
        })
    }
}

/// Outcome of inspecting a received message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The body is already a native envelope and must pass through unchanged.
    Native,
    /// The body is a foreign payload that requires resolution.
    Foreign,
}

/// Classify a parsed message body.
///
/// A body is [`Classification::Native`] iff it carries a `data` object with
/// both `commandName` and `command` present and non-null. A missing or null
/// `data` is not an error; it simply routes the body to resolution.
pub fn classify(body: &serde_json::Value) -> Classification {
    let data = &body["data"];
    if !data["commandName"].is_null() && !data["command"].is_null() {
        Classification::Native
    } else {
        Classification::Foreign
    }
}

/// Serialize a resolved job into the native envelope string used as the
/// outbound or rewritten message body.
pub fn create_payload<J: Job + ?Sized>(job: &J) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope::wrap(job)?)
}
