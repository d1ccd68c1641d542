//! End-to-end tests for the adapter façade against the in-memory backend.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use courier::{
    batch::BATCH_LIMIT,
    queue::CONCURRENCY,
    transport::InMemory,
    BatchEntry, BatchResult, BulkErrorKind, ClassMap, Classification, DynamicQueue,
    HandlerRegistry, Job, PopErrorKind, QueueClient, ResolveErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ExampleJob {
    driver_id: u64,
    user_id: u64,
}

impl Job for ExampleJob {
    fn name(&self) -> &str {
        "ExampleJob"
    }

    fn command(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn class_map_queue(client: InMemory) -> DynamicQueue<InMemory, ClassMap> {
    let map = ClassMap::new().register_type::<ExampleJob>("example_job");
    DynamicQueue::new(client, map, "default")
}

fn handler_queue(client: InMemory) -> DynamicQueue<InMemory, HandlerRegistry> {
    let registry = HandlerRegistry::new().register(
        "example_job_handler",
        |payload: &serde_json::Value| -> Result<Box<dyn Job>, tower::BoxError> {
            let job: ExampleJob = serde_json::from_value(payload["data"].clone())?;
            Ok(Box::new(job))
        },
    );
    DynamicQueue::new(client, registry, "default")
}

#[tokio::test]
async fn native_bodies_pass_through_unchanged() {
    let native = json!({
        "uuid": "25b2b1cc-a57b-4c2e-ad2a-e4ac7e4dd504",
        "displayName": "ExampleJob",
        "maxTries": null,
        "data": { "commandName": "ExampleJob", "command": "O:10:\"ExampleJob\"" }
    })
    .to_string();

    let client = InMemory::default();
    client.push_message(native.clone()).await;

    let job = class_map_queue(client).pop(None).await.unwrap().unwrap();
    assert_eq!(job.body, native);
    assert_eq!(job.queue, "default");
    assert_eq!(job.receive_count, 1);
}

#[tokio::test]
async fn empty_queue_pops_nothing() {
    let queue = class_map_queue(InMemory::default());
    assert!(queue.pop(None).await.unwrap().is_none());
}

#[tokio::test]
async fn unparseable_bodies_fail_with_a_decode_error() {
    let client = InMemory::default();
    client.push_message("not json {").await;

    let err = class_map_queue(client).pop(None).await.unwrap_err();
    assert!(matches!(err.kind(), PopErrorKind::Decode(_)));
}

#[tokio::test]
async fn class_map_payloads_are_rewritten_into_native_envelopes() {
    let client = InMemory::default();
    client
        .push_message(json!({ "jobClassId": "example_job", "data": { "driverId": 100 } }).to_string())
        .await;

    let job = class_map_queue(client).pop(None).await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&job.body).unwrap();

    assert_eq!(courier::classify(&body), Classification::Native);
    assert_eq!(body["data"]["commandName"], "ExampleJob");
    assert_eq!(body["data"]["command"]["driverId"], 100);
    assert_eq!(body["displayName"], "ExampleJob");
    assert!(body["uuid"].is_string());
}

#[tokio::test]
async fn handler_registry_payloads_are_rewritten_into_native_envelopes() {
    let client = InMemory::default();
    client
        .push_message(
            json!({ "handler": "example_job_handler", "data": { "userId": 100 } }).to_string(),
        )
        .await;

    let job = handler_queue(client).pop(None).await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&job.body).unwrap();

    assert_eq!(body["data"]["commandName"], "ExampleJob");
    assert_eq!(body["data"]["command"]["userId"], 100);
}

#[tokio::test]
async fn unresolvable_payloads_fail_the_pop() {
    let client = InMemory::default();
    client
        .push_message(json!({ "handler": "unregistered", "data": {} }).to_string())
        .await;

    let err = handler_queue(client).pop(None).await.unwrap_err();
    match err.kind() {
        PopErrorKind::Resolve(resolve) => {
            assert!(matches!(resolve.kind(), ResolveErrorKind::HandlerNotFound(_)));
        }
        other => panic!("expected a resolve error, got {other:?}"),
    }
}

#[tokio::test]
async fn bulk_partitions_by_entry_count() {
    let client = InMemory::default();
    let queue = class_map_queue(client.clone());

    let jobs: Vec<ExampleJob> = (0..25)
        .map(|driver_id| ExampleJob { driver_id, user_id: 0 })
        .collect();
    queue.bulk(jobs, None).await.unwrap();

    let batches = client.sent_batches().await;
    let sizes: Vec<_> = batches.iter().map(|(_, entries)| entries.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert!(batches.iter().all(|(queue, _)| queue == "default"));
    assert!(batches.iter().all(|(_, entries)| entries.len() <= BATCH_LIMIT));
}

#[tokio::test]
async fn bulk_entry_ids_are_fresh_and_unique() {
    let client = InMemory::default();
    let queue = class_map_queue(client.clone());

    let jobs: Vec<ExampleJob> = (0..15).map(|_| ExampleJob::default()).collect();
    queue.bulk(jobs, Some("priority")).await.unwrap();

    let batches = client.sent_batches().await;
    assert!(batches.iter().all(|(queue, _)| queue == "priority"));

    let mut ids: Vec<String> = batches
        .iter()
        .flat_map(|(_, entries)| entries.iter().map(|e| e.id.clone()))
        .collect();
    assert_eq!(ids.len(), 15);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 15, "batch entry ids must be unique");
}

#[tokio::test]
async fn bulk_bodies_are_native_envelopes() {
    let client = InMemory::default();
    let queue = class_map_queue(client.clone());

    queue
        .bulk(vec![ExampleJob { driver_id: 9, user_id: 0 }], None)
        .await
        .unwrap();

    let batches = client.sent_batches().await;
    let body: serde_json::Value = serde_json::from_str(&batches[0].1[0].body).unwrap();
    assert_eq!(courier::classify(&body), Classification::Native);
    assert_eq!(body["data"]["commandName"], "ExampleJob");
}

#[tokio::test]
async fn bulk_with_no_jobs_sends_nothing() {
    let client = InMemory::default();
    let queue = class_map_queue(client.clone());

    queue.bulk(Vec::<ExampleJob>::new(), None).await.unwrap();
    assert!(client.sent_batches().await.is_empty());
}

#[tokio::test]
async fn any_failed_entry_fails_the_whole_bulk_call() {
    // Reject envelopes whose command carries driverId 13.
    let client =
        InMemory::default().fail_entries_when(|entry| entry.body.contains("\"driverId\":13"));
    let queue = class_map_queue(client);

    let jobs: Vec<ExampleJob> = (10..20)
        .map(|driver_id| ExampleJob { driver_id, user_id: 0 })
        .collect();
    let err = queue.bulk(jobs, None).await.unwrap_err();

    match err.kind() {
        BulkErrorKind::BatchSendFailed(failed) => {
            assert_eq!(failed.len(), 1);
            assert!(!failed[0].reason.is_empty());
        }
        other => panic!("expected BatchSendFailed, got {other:?}"),
    }
}

/// Backend that records the high-water mark of concurrent batch sends.
#[derive(Clone, Default)]
struct GaugeClient {
    in_flight: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl QueueClient for GaugeClient {
    type Error = std::io::Error;

    async fn receive_message(
        &self,
        _queue: &str,
    ) -> Result<Option<courier::ReceivedMessage>, Self::Error> {
        Ok(None)
    }

    async fn send_message_batch(
        &self,
        _queue: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResult, Self::Error> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(BatchResult {
            successful: entries.into_iter().map(|e| e.id).collect(),
            failed: Vec::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn bulk_caps_in_flight_batch_sends() {
    let client = GaugeClient::default();
    let map = ClassMap::new().register_type::<ExampleJob>("example_job");
    let queue = DynamicQueue::new(client.clone(), map, "default");

    // 250 jobs partition into 25 batches, well past the concurrency cap.
    let jobs: Vec<ExampleJob> = (0..250)
        .map(|driver_id| ExampleJob { driver_id, user_id: 0 })
        .collect();
    queue.bulk(jobs, None).await.unwrap();

    assert_eq!(client.high_water.load(Ordering::SeqCst), CONCURRENCY);
    assert_eq!(client.in_flight.load(Ordering::SeqCst), 0);
}
