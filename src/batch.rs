//! Batch partitioning for outbound payloads.
//!
//! Providers cap both the number of entries and the cumulative size of a
//! batch-send request. [`partition`] splits serialized payloads into batches
//! respecting both caps while preserving input order.

/// Maximum number of entries per batch.
pub const BATCH_LIMIT: usize = 10;

/// Maximum cumulative payload bytes per batch.
pub const BATCH_SIZE_LIMIT: usize = 200 * 1024;

/// Lazily partition payloads into batches.
///
/// Payloads are accumulated in input order. A batch is sealed as soon as it
/// reaches [`BATCH_LIMIT`] entries or [`BATCH_SIZE_LIMIT`] bytes, or earlier
/// when the next payload would push it past the byte budget. A payload that
/// alone exceeds the byte budget still ships, as a batch of one. The
/// trailing partial batch is sealed at end of input.
pub fn partition<I>(payloads: I) -> Batches<I::IntoIter>
where
    I: IntoIterator<Item = String>,
{
    Batches {
        payloads: payloads.into_iter(),
        pending: None,
    }
}

/// Iterator of sealed batches produced by [`partition`].
#[derive(Debug)]
pub struct Batches<I> {
    payloads: I,
    /// Payload that did not fit the previously sealed batch.
    pending: Option<String>,
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = String>,
{
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::new();
        let mut bytes = 0usize;

        if let Some(payload) = self.pending.take() {
            bytes += payload.len();
            batch.push(payload);
            if bytes >= BATCH_SIZE_LIMIT {
                return Some(batch);
            }
        }

        for payload in self.payloads.by_ref() {
            if !batch.is_empty() && bytes + payload.len() > BATCH_SIZE_LIMIT {
                self.pending = Some(payload);
                return Some(batch);
            }
            bytes += payload.len();
            batch.push(payload);
            if batch.len() >= BATCH_LIMIT || bytes >= BATCH_SIZE_LIMIT {
                return Some(batch);
            }
        }

        if batch.is_empty() { None } else { Some(batch) }
    }
}
