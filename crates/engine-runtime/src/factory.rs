use crate::supervisor::{PartitionSupervisor, config::SupervisorConfig};
use engine_core::{
    connectors::{feed::FeedReader, observer::ObserverFactory},
    monitor::{HealthMonitor, TracingHealthMonitor},
    state::LeaseStore,
};
use model::Lease;
use std::sync::Arc;
use tracing::debug;

/// Builds a ready-to-run supervisor for each acquired lease.
pub struct PartitionSupervisorFactory {
    store: Arc<dyn LeaseStore>,
    reader: Arc<dyn FeedReader>,
    observers: Arc<dyn ObserverFactory>,
    config: SupervisorConfig,
    monitor: Arc<dyn HealthMonitor>,
}

impl PartitionSupervisorFactory {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        reader: Arc<dyn FeedReader>,
        observers: Arc<dyn ObserverFactory>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            reader,
            observers,
            config,
            monitor: Arc::new(TracingHealthMonitor),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn HealthMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn create(&self, lease: Lease) -> PartitionSupervisor {
        debug!(partition = %lease.partition_id, "Creating partition supervisor");
        PartitionSupervisor::new(
            lease,
            self.store.clone(),
            self.reader.clone(),
            self.observers.create(),
            self.config.clone(),
            self.monitor.clone(),
        )
    }
}
