use engine_core::{backoff::BackoffPolicy, connectors::feed::StartFrom, retry::RetryPolicy};
use std::time::Duration;

/// Immutable, validated configuration shared by every partition supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings {
    /// How long a lease stays valid without renewal
    pub lease_expiration: Duration,
    /// Interval between renewals
    pub renew_interval: Duration,
    /// Delay before the first renewal
    pub renew_initial_delay: Duration,
    /// Wait policy for idle partitions
    pub idle_backoff: BackoffPolicy,
    /// Page size requested from the feed reader
    pub max_item_count: usize,
    /// Read position for partitions that were never checkpointed
    pub start_from: StartFrom,
    /// Retries for renew/checkpoint/release writes
    pub store_retry: RetryPolicy,
    /// Retries for transient read failures
    pub reader_retry: RetryPolicy,
    /// Whether a stopping supervisor hands its lease back
    pub release_on_stop: bool,
    /// Pause between lag estimation passes
    pub estimation_period: Duration,
}

impl Default for ValidatedSettings {
    fn default() -> Self {
        ValidatedSettingsBuilder::new().build()
    }
}

impl ValidatedSettings {
    pub fn from_builder(builder: ValidatedSettingsBuilder) -> Self {
        let renew_interval = builder.renew_interval.unwrap_or(Duration::from_secs(17));
        Self {
            lease_expiration: builder.lease_expiration.unwrap_or(Duration::from_secs(60)),
            renew_interval,
            renew_initial_delay: builder.renew_initial_delay.unwrap_or(renew_interval / 2),
            idle_backoff: builder.idle_backoff.unwrap_or_default(),
            max_item_count: builder.max_item_count.unwrap_or(100),
            start_from: builder.start_from.unwrap_or_default(),
            store_retry: builder
                .store_retry
                .unwrap_or_else(RetryPolicy::for_lease_store),
            reader_retry: builder.reader_retry.unwrap_or_default(),
            release_on_stop: builder.release_on_stop.unwrap_or(true),
            estimation_period: builder
                .estimation_period
                .unwrap_or(Duration::from_secs(5)),
        }
    }

    pub fn renew_interval(&self) -> Duration {
        self.renew_interval
    }

    pub fn lease_expiration(&self) -> Duration {
        self.lease_expiration
    }

    pub fn max_item_count(&self) -> usize {
        self.max_item_count
    }

    pub fn release_on_stop(&self) -> bool {
        self.release_on_stop
    }
}

#[derive(Debug, Default)]
pub struct ValidatedSettingsBuilder {
    pub lease_expiration: Option<Duration>,
    pub renew_interval: Option<Duration>,
    pub renew_initial_delay: Option<Duration>,
    pub idle_backoff: Option<BackoffPolicy>,
    pub max_item_count: Option<usize>,
    pub start_from: Option<StartFrom>,
    pub store_retry: Option<RetryPolicy>,
    pub reader_retry: Option<RetryPolicy>,
    pub release_on_stop: Option<bool>,
    pub estimation_period: Option<Duration>,
}

impl ValidatedSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lease_expiration(mut self, expiration: Duration) -> Self {
        self.lease_expiration = Some(expiration);
        self
    }

    pub fn renew_interval(mut self, interval: Duration) -> Self {
        self.renew_interval = Some(interval);
        self
    }

    pub fn renew_initial_delay(mut self, delay: Duration) -> Self {
        self.renew_initial_delay = Some(delay);
        self
    }

    pub fn idle_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.idle_backoff = Some(backoff);
        self
    }

    pub fn max_item_count(mut self, count: usize) -> Self {
        self.max_item_count = Some(count);
        self
    }

    pub fn start_from(mut self, start_from: StartFrom) -> Self {
        self.start_from = Some(start_from);
        self
    }

    pub fn store_retry(mut self, retry: RetryPolicy) -> Self {
        self.store_retry = Some(retry);
        self
    }

    pub fn reader_retry(mut self, retry: RetryPolicy) -> Self {
        self.reader_retry = Some(retry);
        self
    }

    pub fn release_on_stop(mut self, release: bool) -> Self {
        self.release_on_stop = Some(release);
        self
    }

    pub fn estimation_period(mut self, period: Duration) -> Self {
        self.estimation_period = Some(period);
        self
    }

    pub fn build(self) -> ValidatedSettings {
        ValidatedSettings::from_builder(self)
    }
}
