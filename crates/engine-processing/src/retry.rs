use crate::error::KeeperError;
use engine_core::{
    error::{ReadError, StoreError},
    retry::RetryDisposition,
};

pub fn classify_store_error(err: &StoreError) -> RetryDisposition {
    match err {
        StoreError::Unavailable(_) => RetryDisposition::Retry,
        StoreError::Conflict { .. } => RetryDisposition::Stop,
        StoreError::NotFound { .. } => RetryDisposition::Stop,
        StoreError::Corrupted(_) => RetryDisposition::Stop,
    }
}

pub fn classify_keeper_error(err: &KeeperError) -> RetryDisposition {
    match err {
        KeeperError::Store(store_err) => classify_store_error(store_err),
        KeeperError::MailboxClosed => RetryDisposition::Stop,
    }
}

pub fn classify_read_error(err: &ReadError) -> RetryDisposition {
    match err {
        ReadError::Transient(_) => RetryDisposition::Retry,
        ReadError::PartitionGone { .. } => RetryDisposition::Stop,
        ReadError::Fatal(_) => RetryDisposition::Stop,
    }
}
