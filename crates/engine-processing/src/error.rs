use engine_core::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    #[error("Lease store error: {0}")]
    Store(#[from] StoreError),

    /// The keeper task has exited: the lease was released or the supervisor is gone.
    #[error("Lease keeper mailbox closed")]
    MailboxClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("Lease for partition '{partition_id}' lost while checkpointing: {reason}")]
    LeaseLost {
        partition_id: String,
        reason: String,
    },

    #[error("Checkpoint cancelled while waiting to retry")]
    Cancelled,
}
