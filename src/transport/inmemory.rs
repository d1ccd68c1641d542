use std::{
    collections::VecDeque,
    sync::Arc,
};

use tokio::sync::Mutex;

use super::{BatchEntry, BatchResult, FailedEntry, QueueClient, ReceivedMessage};

type FailurePredicate = Arc<dyn Fn(&BatchEntry) -> bool + Send + Sync>;

/// In-memory queue backend for testing or local pipelines.
///
/// Receivable messages are seeded with [`push_message`](InMemory::push_message);
/// sent batches are recorded and can be drained with
/// [`sent_batches`](InMemory::sent_batches). A failure predicate can mark
/// individual entries as rejected to exercise partial-failure handling.
pub struct InMemory {
    incoming: Arc<Mutex<VecDeque<ReceivedMessage>>>,
    sent: Arc<Mutex<Vec<(String, Vec<BatchEntry>)>>>,
    fail_entry: Option<FailurePredicate>,
}

impl Default for InMemory {
    /// Create an empty in-memory backend that accepts every entry.
    fn default() -> Self {
        Self {
            incoming: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_entry: None,
        }
    }
}

impl Clone for InMemory {
    fn clone(&self) -> Self {
        Self {
            incoming: Arc::clone(&self.incoming),
            sent: Arc::clone(&self.sent),
            fail_entry: self.fail_entry.clone(),
        }
    }
}

impl InMemory {
    /// Seed a receivable message with the given body.
    pub async fn push_message(&self, body: impl Into<String>) {
        let message = ReceivedMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            receipt_handle: Some(uuid::Uuid::new_v4().to_string()),
            receive_count: 1,
            body: body.into(),
        };
        self.incoming.lock().await.push_back(message);
    }

    /// Reject every entry matching the predicate, with the given reason.
    pub fn fail_entries_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BatchEntry) -> bool + Send + Sync + 'static,
    {
        self.fail_entry = Some(Arc::new(predicate));
        self
    }

    /// Return all batches that have been "sent" and clear the record.
    ///
    /// Primarily intended for assertions in tests.
    pub async fn sent_batches(self) -> Vec<(String, Vec<BatchEntry>)> {
        let mut sent = self.sent.lock().await;
        std::mem::take(&mut *sent)
    }
}

#[async_trait::async_trait]
impl QueueClient for InMemory {
    type Error = std::io::Error;

    #[tracing::instrument(skip_all)]
    async fn receive_message(&self, queue: &str) -> Result<Option<ReceivedMessage>, Self::Error> {
        let message = self.incoming.lock().await.pop_front();
        tracing::debug!(queue, received = message.is_some(), "Received from in-memory queue");
        Ok(message)
    }

    #[tracing::instrument(skip_all)]
    async fn send_message_batch(
        &self,
        queue: &str,
        entries: Vec<BatchEntry>,
    ) -> Result<BatchResult, Self::Error> {
        let mut result = BatchResult::default();
        for entry in &entries {
            if self.fail_entry.as_ref().is_some_and(|fail| fail(entry)) {
                result.failed.push(FailedEntry {
                    id: entry.id.clone(),
                    reason: "rejected by in-memory backend".to_owned(),
                });
            } else {
                result.successful.push(entry.id.clone());
            }
        }

        tracing::info!(
            queue,
            entries = entries.len(),
            failed = result.failed.len(),
            "Batch sent to in-memory queue",
        );
        self.sent.lock().await.push((queue.to_owned(), entries));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_queue_receives_nothing() {
        let client = InMemory::default();
        assert!(client.receive_message("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seeded_messages_come_back_in_order() {
        let client = InMemory::default();
        client.push_message("first").await;
        client.push_message("second").await;

        let first = client.receive_message("q").await.unwrap().unwrap();
        let second = client.receive_message("q").await.unwrap().unwrap();
        assert_eq!(first.body, "first");
        assert_eq!(second.body, "second");
        assert_eq!(first.receive_count, 1);
    }

    #[tokio::test]
    async fn every_entry_lands_in_exactly_one_result_list() {
        let client =
            InMemory::default().fail_entries_when(|entry| entry.body.contains("poison"));
        let entries = vec![
            BatchEntry { id: "1".into(), body: "ok".into() },
            BatchEntry { id: "2".into(), body: "poison".into() },
            BatchEntry { id: "3".into(), body: "ok".into() },
        ];

        let result = client.send_message_batch("q", entries).await.unwrap();
        assert_eq!(result.successful, vec!["1", "3"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "2");
    }
}
