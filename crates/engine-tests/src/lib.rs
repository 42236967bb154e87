#![allow(dead_code)]

use engine_config::settings::{ProcessorSettings, validator::SettingsValidator};
use engine_core::{
    backoff::BackoffPolicy,
    monitor::{HealthMonitor, RecordingHealthMonitor},
    retry::RetryPolicy,
    state::LeaseStore,
};
use engine_processing::{feed::config::FeedProcessorConfig, renewer::config::RenewerConfig};
use engine_runtime::supervisor::config::SupervisorConfig;
use model::Lease;
use std::{sync::Arc, time::Duration};

pub mod utils;

pub const OWNER_A: &str = "worker-a";
pub const OWNER_B: &str = "worker-b";

/// Supervisor tuning used by the scenarios: renew every 10s (first at 5s),
/// idle backoff 100ms..800ms, fast store retries.
pub fn supervisor_config() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_renewer(
            RenewerConfig::with_interval(Duration::from_secs(10)).with_retry(RetryPolicy::new(
                3,
                Duration::from_millis(20),
                Duration::from_millis(100),
            )),
        )
        .with_feed(
            FeedProcessorConfig::default()
                .with_backoff(BackoffPolicy::new(
                    Duration::from_millis(100),
                    Duration::from_millis(800),
                    2.0,
                ))
                .with_read_retry(RetryPolicy::new(
                    2,
                    Duration::from_millis(20),
                    Duration::from_millis(100),
                )),
        )
}

/// The same tuning, loaded the way the binary loads it.
pub fn supervisor_config_from_json() -> SupervisorConfig {
    let settings = ProcessorSettings::from_json_str(
        r#"{
            "renew_interval_ms": 10000,
            "renew_initial_delay_ms": 5000,
            "idle_backoff_min_ms": 100,
            "idle_backoff_max_ms": 800,
            "idle_backoff_multiplier": 2.0
        }"#,
    )
    .expect("parse settings");
    let validated = SettingsValidator::new()
        .validate(&settings)
        .expect("valid settings");
    SupervisorConfig::from_settings(&validated)
}

/// Creates the lease if needed and acquires it for `owner`.
pub async fn acquired(store: &dyn LeaseStore, partition_id: &str, owner: &str) -> Lease {
    store
        .create_if_absent(partition_id, None)
        .await
        .expect("create lease");
    store
        .acquire(partition_id, owner)
        .await
        .expect("acquire lease")
}

pub fn recording_monitor() -> (Arc<RecordingHealthMonitor>, Arc<dyn HealthMonitor>) {
    let monitor = Arc::new(RecordingHealthMonitor::new());
    (monitor.clone(), monitor)
}
