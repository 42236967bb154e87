use thiserror::Error;

/// Failures reported by a [`LeaseStore`](crate::state::LeaseStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The presented concurrency token or owner no longer matches the stored
    /// record: somebody else wrote the lease since it was last read.
    #[error("Lease for partition '{partition_id}' was modified by another writer")]
    Conflict { partition_id: String },

    /// The lease was deleted by fleet management.
    #[error("Lease for partition '{partition_id}' does not exist")]
    NotFound { partition_id: String },

    /// Timeout, throttling or connectivity loss. Worth retrying.
    #[error("Lease store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("Lease record corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    pub fn conflict(partition_id: impl Into<String>) -> Self {
        StoreError::Conflict {
            partition_id: partition_id.into(),
        }
    }

    pub fn not_found(partition_id: impl Into<String>) -> Self {
        StoreError::NotFound {
            partition_id: partition_id.into(),
        }
    }

    /// Conflict and not-found both mean ownership can no longer be confirmed.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::NotFound { .. })
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        match err {
            sled::Error::Io(e) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Corrupted(other.to_string()),
        }
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Corrupted(err.to_string())
    }
}

/// Failures reported by a [`FeedReader`](crate::connectors::feed::FeedReader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The partition was split or merged away.
    #[error("Partition '{partition_id}' no longer exists")]
    PartitionGone { partition_id: String },

    #[error("Transient read failure: {0}")]
    Transient(String),

    #[error("Read failed: {0}")]
    Fatal(String),
}

/// Error raised by user logic inside an [`Observer`](crate::connectors::observer::Observer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_source(err: &(dyn std::error::Error + Send + Sync)) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ObserverError {
    fn from(s: &str) -> Self {
        ObserverError::new(s)
    }
}

impl From<String> for ObserverError {
    fn from(s: String) -> Self {
        ObserverError::new(s)
    }
}
