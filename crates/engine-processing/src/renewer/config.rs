use engine_config::settings::validated::ValidatedSettings;
use engine_core::retry::RetryPolicy;
use std::time::Duration;

/// Configuration for lease renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewerConfig {
    /// Time between renewals
    pub renew_interval: Duration,

    /// Wait before the first renewal
    pub initial_delay: Duration,

    /// Retries for transient store failures within one renewal
    pub retry: RetryPolicy,
}

impl Default for RenewerConfig {
    fn default() -> Self {
        Self::with_interval(Duration::from_secs(17))
    }
}

impl RenewerConfig {
    /// Renews every `renew_interval`, the first time after half of it.
    pub fn with_interval(renew_interval: Duration) -> Self {
        Self {
            renew_interval,
            initial_delay: renew_interval / 2,
            retry: RetryPolicy::for_lease_store(),
        }
    }

    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            renew_interval: settings.renew_interval,
            initial_delay: settings.renew_initial_delay,
            retry: settings.store_retry.clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
