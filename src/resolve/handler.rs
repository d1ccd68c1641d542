use std::{collections::HashMap, sync::Arc};

use crate::envelope::Job;

use super::{ResolveError, ResolveJob};

/// Handler owning the payload-to-job mapping for one handler id.
///
/// Unlike the class-map strategy, the adapter does not look at the payload's
/// shape here; the handler receives the full payload and constructs whatever
/// job it sees fit.
pub trait JobHandler: Send + Sync {
    /// Construct a job from the full foreign payload.
    fn handle(&self, payload: &serde_json::Value) -> Result<Box<dyn Job>, tower::BoxError>;
}

impl<F> JobHandler for F
where
    F: Fn(&serde_json::Value) -> Result<Box<dyn Job>, tower::BoxError> + Send + Sync,
{
    fn handle(&self, payload: &serde_json::Value) -> Result<Box<dyn Job>, tower::BoxError> {
        self(payload)
    }
}

/// Handler-registry resolution strategy.
///
/// A pluggable discoverer extracts a handler id from the payload; the id is
/// looked up in the registry and envelope construction is delegated to the
/// matching [`JobHandler`]. The default discoverer reads the payload's
/// `handler` field.
///
/// The discoverer must be side-effect-free: it may be invoked concurrently
/// from overlapping `pop` calls.
#[derive(Clone)]
pub struct HandlerRegistry {
    discoverer: Arc<dyn Fn(&serde_json::Value) -> Option<String> + Send + Sync>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self {
            discoverer: Arc::new(|payload| {
                payload
                    .get("handler")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            }),
            handlers: HashMap::new(),
        }
    }
}

impl HandlerRegistry {
    /// Create a registry with the default discoverer (reads `handler`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the discoverer.
    pub fn with_discoverer<D>(mut self, discoverer: D) -> Self
    where
        D: Fn(&serde_json::Value) -> Option<String> + Send + Sync + 'static,
    {
        self.discoverer = Arc::new(discoverer);
        self
    }

    /// Register a handler under an id.
    ///
    /// A later registration under the same id replaces the earlier one.
    pub fn register(
        mut self,
        handler_id: impl Into<String>,
        handler: impl JobHandler + 'static,
    ) -> Self {
        self.handlers.insert(handler_id.into(), Arc::new(handler));
        self
    }
}

impl ResolveJob for HandlerRegistry {
    fn resolve(&self, payload: &serde_json::Value) -> Result<Box<dyn Job>, ResolveError> {
        let handler_id = (self.discoverer)(payload)
            .filter(|id| !id.is_empty())
            .ok_or_else(ResolveError::handler_not_defined)?;

        let handler = self
            .handlers
            .get(&handler_id)
            .ok_or_else(|| ResolveError::handler_not_found(&handler_id))?;

        handler.handle(payload).map_err(ResolveError::handler)
    }
}
