use engine_config::settings::validated::ValidatedSettings;
use engine_core::{backoff::BackoffPolicy, connectors::feed::StartFrom, retry::RetryPolicy};

/// Configuration for the read-process-checkpoint loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedProcessorConfig {
    /// Wait policy after an empty page
    pub backoff: BackoffPolicy,

    /// Retries for transient read failures
    pub read_retry: RetryPolicy,

    /// Retries for unavailable-store checkpoint failures
    pub checkpoint_retry: RetryPolicy,

    /// Page size requested from the reader
    pub max_item_count: usize,

    /// Read position when the lease has no continuation yet
    pub start_from: StartFrom,
}

impl Default for FeedProcessorConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            read_retry: RetryPolicy::default(),
            checkpoint_retry: RetryPolicy::for_lease_store(),
            max_item_count: 100,
            start_from: StartFrom::default(),
        }
    }
}

impl FeedProcessorConfig {
    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            backoff: settings.idle_backoff.clone(),
            read_retry: settings.reader_retry.clone(),
            checkpoint_retry: settings.store_retry.clone(),
            max_item_count: settings.max_item_count,
            start_from: settings.start_from.clone(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_read_retry(mut self, retry: RetryPolicy) -> Self {
        self.read_retry = retry;
        self
    }

    pub fn with_max_item_count(mut self, count: usize) -> Self {
        self.max_item_count = count;
        self
    }
}
