use std::{collections::HashMap, sync::Arc};

use serde::de::DeserializeOwned;

use crate::envelope::Job;

use super::{ResolveError, ResolveJob};

/// Factory constructing a job from the payload's `data` object.
///
/// Factories own the binding from payload fields to job fields. Missing
/// fields should fall back to defaults rather than failing; for job types
/// deserialized with serde that means `#[serde(default)]`. A factory error
/// (e.g. a field of the wrong type) fails the resolution.
pub type JobFactory =
    Arc<dyn Fn(serde_json::Value) -> Result<Box<dyn Job>, tower::BoxError> + Send + Sync>;

/// Class-map resolution strategy.
///
/// Maps the payload's `jobClassId` to a registered [`JobFactory`] and passes
/// it the payload's `data` object (or `null` when absent). Populated at
/// startup, read-only at resolution time.
///
/// ## Example
///
/// ```rust
/// use courier::{ClassMap, Job};
///
/// #[derive(serde::Deserialize, serde::Serialize, Default)]
/// #[serde(default, rename_all = "camelCase")]
/// struct ExampleJob {
///     driver_id: u64,
/// }
///
/// impl Job for ExampleJob {
///     fn name(&self) -> &str {
///         "ExampleJob"
///     }
///
///     fn command(&self) -> Result<serde_json::Value, serde_json::Error> {
///         serde_json::to_value(self)
///     }
/// }
///
/// let map = ClassMap::new().register_type::<ExampleJob>("example_job");
/// ```
#[derive(Clone, Default)]
pub struct ClassMap {
    factories: HashMap<String, JobFactory>,
}

impl ClassMap {
    /// Create an empty class map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a job-class identifier.
    ///
    /// A later registration under the same identifier replaces the earlier
    /// one.
    pub fn register<F>(mut self, class_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<Box<dyn Job>, tower::BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(class_id.into(), Arc::new(factory));
        self
    }

    /// Register a job type deserialized from the payload's `data` object.
    ///
    /// Missing fields follow the type's serde defaults; use
    /// `#[serde(default)]` to keep absent payload keys from failing
    /// resolution. A payload with no `data` object at all deserializes as if
    /// `data` were empty.
    pub fn register_type<T>(self, class_id: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Job + 'static,
    {
        self.register(class_id, |data| {
            let data = match data {
                serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
                other => other,
            };
            let job: T = serde_json::from_value(data)?;
            Ok(Box::new(job))
        })
    }
}

impl ResolveJob for ClassMap {
    fn resolve(&self, payload: &serde_json::Value) -> Result<Box<dyn Job>, ResolveError> {
        let class_id = payload
            .get("jobClassId")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                ResolveError::invalid_mapping("Payload is missing a \"jobClassId\" field")
            })?;

        let factory = self.factories.get(class_id).ok_or_else(|| {
            ResolveError::invalid_mapping(format!(
                "Mapping not found for job class id \"{class_id}\""
            ))
        })?;

        // Absent `data` still reaches the factory; its defaults decide.
        let data = payload
            .get("data")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        factory(data).map_err(ResolveError::handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolveErrorKind;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize, Default)]
    #[serde(default, rename_all = "camelCase")]
    struct ExampleJob {
        driver_id: u64,
    }

    impl Job for ExampleJob {
        fn name(&self) -> &str {
            "ExampleJob"
        }

        fn command(&self) -> Result<serde_json::Value, serde_json::Error> {
            serde_json::to_value(self)
        }
    }

    fn example_map() -> ClassMap {
        ClassMap::new().register_type::<ExampleJob>("example_job")
    }

    #[test]
    fn resolves_registered_class_ids() {
        let payload = json!({ "jobClassId": "example_job", "data": { "driverId": 100 } });
        let job = example_map().resolve(&payload).unwrap();
        assert_eq!(job.name(), "ExampleJob");
        assert_eq!(job.command().unwrap(), json!({ "driverId": 100 }));
    }

    #[test]
    fn missing_payload_fields_fall_back_to_defaults() {
        let payload = json!({ "jobClassId": "example_job", "data": {} });
        let job = example_map().resolve(&payload).unwrap();
        assert_eq!(job.command().unwrap(), json!({ "driverId": 0 }));
    }

    #[test]
    fn absent_data_objects_fall_back_to_defaults() {
        let payload = json!({ "jobClassId": "example_job" });
        let job = example_map().resolve(&payload).unwrap();
        assert_eq!(job.command().unwrap(), json!({ "driverId": 0 }));
    }

    #[test]
    fn unknown_class_ids_name_the_attempted_id() {
        let payload = json!({ "jobClassId": "missing_job", "data": {} });
        let err = example_map().resolve(&payload).err().unwrap();
        assert!(matches!(err.kind(), ResolveErrorKind::InvalidMapping(_)));
        assert!(err.to_string().contains("missing_job"));
    }

    #[test]
    fn missing_class_id_is_an_invalid_mapping() {
        let payload = json!({ "data": { "driverId": 100 } });
        let err = example_map().resolve(&payload).err().unwrap();
        assert!(matches!(err.kind(), ResolveErrorKind::InvalidMapping(_)));
        assert!(err.to_string().contains("jobClassId"));
    }

    #[test]
    fn mistyped_payload_fields_fail_resolution() {
        let payload = json!({ "jobClassId": "example_job", "data": { "driverId": "not-a-number" } });
        let err = example_map().resolve(&payload).err().unwrap();
        assert!(matches!(err.kind(), ResolveErrorKind::Handler(_)));
    }
}
