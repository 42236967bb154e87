use serde::{Deserialize, Serialize};

/// One change read from a partition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Identity of the changed item.
    pub key: String,
    /// Monotonic position of the change inside its partition. Consumers use it
    /// to drop duplicates after a redelivery.
    pub sequence: u64,
    pub body: serde_json::Value,
}

impl ChangeRecord {
    pub fn new(key: impl Into<String>, sequence: u64, body: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            sequence,
            body,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.key.len() + self.body.to_string().len()
    }
}
