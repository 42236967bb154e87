use crate::settings::{
    ProcessorSettings, RetrySettings,
    error::SettingsError,
    validated::{ValidatedSettings, ValidatedSettingsBuilder},
};
use engine_core::{backoff::BackoffPolicy, retry::RetryPolicy};
use std::time::Duration;
use tracing::{info, warn};

/// Longest lease a partition may be held without renewal (one day).
pub const MAX_LEASE_EXPIRATION_MS: u64 = 24 * 60 * 60 * 1_000;

/// Validates processor settings before any supervisor is created.
#[derive(Debug, Default)]
pub struct SettingsValidator;

impl SettingsValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, settings: &ProcessorSettings) -> Result<ValidatedSettings, SettingsError> {
        let mut builder = ValidatedSettingsBuilder::new();
        let mut errors: Vec<String> = Vec::new();

        self.validate_lease_timing(settings, &mut builder, &mut errors);
        self.validate_idle_backoff(settings, &mut builder, &mut errors);
        self.validate_max_item_count(settings, &mut builder, &mut errors);

        builder.store_retry = self.validate_retry("store_retry", &settings.store_retry, &mut errors);
        builder.reader_retry =
            self.validate_retry("reader_retry", &settings.reader_retry, &mut errors);
        builder.start_from = Some((&settings.start_from).into());
        builder.release_on_stop = Some(settings.release_on_stop);

        if settings.estimation_period_ms == 0 {
            errors.push("estimation_period_ms must be greater than zero".to_string());
        }
        builder.estimation_period = Some(Duration::from_millis(settings.estimation_period_ms));

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = builder.build();
        self.log_validated_settings(&validated);
        Ok(validated)
    }

    fn validate_lease_timing(
        &self,
        settings: &ProcessorSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        if settings.renew_interval_ms == 0 {
            errors.push("renew_interval_ms must be greater than zero".to_string());
        }
        if settings.renew_interval_ms >= settings.lease_expiration_ms {
            errors.push(format!(
                "renew_interval_ms ({}) must be shorter than lease_expiration_ms ({})",
                settings.renew_interval_ms, settings.lease_expiration_ms
            ));
        } else if settings.renew_interval_ms.saturating_mul(2) > settings.lease_expiration_ms {
            warn!(
                "Renew interval {}ms leaves little headroom before the {}ms lease expiration",
                settings.renew_interval_ms, settings.lease_expiration_ms
            );
        }

        if settings.lease_expiration_ms > MAX_LEASE_EXPIRATION_MS {
            errors.push(format!(
                "lease_expiration_ms ({}) must not exceed {MAX_LEASE_EXPIRATION_MS}",
                settings.lease_expiration_ms
            ));
        }

        if let Some(initial) = settings.renew_initial_delay_ms {
            if initial >= settings.lease_expiration_ms {
                errors.push(format!(
                    "renew_initial_delay_ms ({initial}) must be shorter than lease_expiration_ms ({})",
                    settings.lease_expiration_ms
                ));
            }
            builder.renew_initial_delay = Some(Duration::from_millis(initial));
        }

        builder.lease_expiration = Some(Duration::from_millis(settings.lease_expiration_ms));
        builder.renew_interval = Some(Duration::from_millis(settings.renew_interval_ms));
    }

    fn validate_idle_backoff(
        &self,
        settings: &ProcessorSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        if settings.idle_backoff_min_ms > settings.idle_backoff_max_ms {
            errors.push(format!(
                "idle_backoff_min_ms ({}) must not exceed idle_backoff_max_ms ({})",
                settings.idle_backoff_min_ms, settings.idle_backoff_max_ms
            ));
        }
        if !settings.idle_backoff_multiplier.is_finite() || settings.idle_backoff_multiplier < 1.0 {
            errors.push(format!(
                "idle_backoff_multiplier ({}) must be at least 1.0",
                settings.idle_backoff_multiplier
            ));
        }
        if settings.idle_backoff_min_ms == 0 {
            warn!("idle_backoff_min_ms is 0, idle partitions will be polled without pause");
        }

        builder.idle_backoff = Some(BackoffPolicy::new(
            Duration::from_millis(settings.idle_backoff_min_ms),
            Duration::from_millis(settings.idle_backoff_max_ms),
            settings.idle_backoff_multiplier,
        ));
    }

    fn validate_max_item_count(
        &self,
        settings: &ProcessorSettings,
        builder: &mut ValidatedSettingsBuilder,
        errors: &mut Vec<String>,
    ) {
        if settings.max_item_count == 0 {
            errors.push("max_item_count must be greater than zero".to_string());
            return;
        }
        if settings.max_item_count > 10_000 {
            warn!(
                "max_item_count {} is very large, batches may take long to process",
                settings.max_item_count
            );
        }
        builder.max_item_count = Some(settings.max_item_count);
    }

    fn validate_retry(
        &self,
        name: &str,
        retry: &RetrySettings,
        errors: &mut Vec<String>,
    ) -> Option<RetryPolicy> {
        if retry.max_attempts == 0 {
            errors.push(format!("{name}.max_attempts must be at least 1"));
            return None;
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            errors.push(format!(
                "{name}.base_delay_ms ({}) must not exceed {name}.max_delay_ms ({})",
                retry.base_delay_ms, retry.max_delay_ms
            ));
            return None;
        }
        Some(RetryPolicy::new(
            retry.max_attempts,
            Duration::from_millis(retry.base_delay_ms),
            Duration::from_millis(retry.max_delay_ms),
        ))
    }

    fn log_validated_settings(&self, settings: &ValidatedSettings) {
        info!("=== Validated Settings ===");
        info!("  Lease Expiration: {:?}", settings.lease_expiration);
        info!("  Renew Interval: {:?}", settings.renew_interval);
        info!("  First Renewal After: {:?}", settings.renew_initial_delay);
        info!("  Idle Backoff: {:?}", settings.idle_backoff);
        info!("  Max Item Count: {}", settings.max_item_count);
        info!("  Start From: {:?}", settings.start_from);
        info!("  Release On Stop: {}", settings.release_on_stop);
        info!("  Estimation Period: {:?}", settings.estimation_period);
        info!("=========================");
    }
}
