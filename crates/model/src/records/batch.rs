use crate::{lease::ContinuationToken, records::change::ChangeRecord};
use chrono::{DateTime, Utc};

/// Ordered changes delivered to the observer in one call.
///
/// Checkpointing `continuation` marks every record of the batch as consumed;
/// a batch is never checkpointed partially.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub id: String,
    pub partition_id: String,
    pub records: Vec<ChangeRecord>,
    pub start: Option<ContinuationToken>, // last checkpointed position before this batch
    pub continuation: ContinuationToken,  // resume-from position (end of this batch)
    pub received_at: DateTime<Utc>,
}

impl ChangeBatch {
    pub fn new(
        partition_id: impl Into<String>,
        start: Option<ContinuationToken>,
        continuation: ContinuationToken,
        records: Vec<ChangeRecord>,
    ) -> Self {
        let partition_id = partition_id.into();
        let id = batch_id_for(&partition_id, start.as_ref(), &continuation);
        Self {
            id,
            partition_id,
            records,
            start,
            continuation,
            received_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.records.iter().map(|r| r.size_bytes()).sum()
    }
}

/// Stable id: a batch redelivered after the same checkpoint gets the same id.
pub fn batch_id_for(
    partition_id: &str,
    start: Option<&ContinuationToken>,
    continuation: &ContinuationToken,
) -> String {
    let mut h = blake3::Hasher::new();
    h.update(partition_id.as_bytes());
    h.update(b":");
    h.update(start.map(|s| s.as_str()).unwrap_or("").as_bytes());
    h.update(b":");
    h.update(continuation.as_str().as_bytes());
    format!("bat-{}", &h.finalize().to_hex()[..16])
}
