use crate::settings::error::SettingsError;
use chrono::{DateTime, Utc};
use engine_core::connectors::feed::StartFrom;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub mod validated;
pub mod validator;

/// Retry block as written in a settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Where a partition without a checkpoint starts reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFromSetting {
    Beginning,
    #[default]
    Now,
    Time(DateTime<Utc>),
}

impl From<&StartFromSetting> for StartFrom {
    fn from(setting: &StartFromSetting) -> Self {
        match setting {
            StartFromSetting::Beginning => StartFrom::Beginning,
            StartFromSetting::Now => StartFrom::Now,
            StartFromSetting::Time(ts) => StartFrom::Time(*ts),
        }
    }
}

/// Raw processor settings. Durations are milliseconds and every field is
/// optional in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorSettings {
    pub lease_expiration_ms: u64,
    pub renew_interval_ms: u64,
    /// Delay before the first renewal; half the renew interval when absent.
    pub renew_initial_delay_ms: Option<u64>,
    pub idle_backoff_min_ms: u64,
    pub idle_backoff_max_ms: u64,
    pub idle_backoff_multiplier: f64,
    pub max_item_count: usize,
    pub start_from: StartFromSetting,
    pub store_retry: RetrySettings,
    pub reader_retry: RetrySettings,
    pub release_on_stop: bool,
    /// Pause between two passes of the lag estimator.
    pub estimation_period_ms: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            lease_expiration_ms: 60_000,
            renew_interval_ms: 17_000,
            renew_initial_delay_ms: None,
            idle_backoff_min_ms: 500,
            idle_backoff_max_ms: 5_000,
            idle_backoff_multiplier: 2.0,
            max_item_count: 100,
            start_from: StartFromSetting::Now,
            store_retry: RetrySettings {
                max_attempts: 4,
                base_delay_ms: 100,
                max_delay_ms: 2_000,
            },
            reader_retry: RetrySettings::default(),
            release_on_stop: true,
            estimation_period_ms: 5_000,
        }
    }
}

impl ProcessorSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
