use crate::{
    error::RegistryError,
    supervisor::{PartitionSupervisor, handle::SupervisorHandle, state::StopOutcome},
};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

struct RunningPartition {
    handle: SupervisorHandle,
    task: JoinHandle<StopOutcome>,
}

/// Running supervisors of this process, keyed by partition id.
///
/// Owned by the composition root; at most one supervisor per partition.
pub struct PartitionRegistry {
    running: HashMap<String, RunningPartition>,
    /// Finished supervisors displaced by a restart before they were reaped.
    retired: Vec<(String, JoinHandle<StopOutcome>)>,
    shutdown: CancellationToken,
}

impl PartitionRegistry {
    /// `shutdown` is passed to every supervisor started through this registry.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            running: HashMap::new(),
            retired: Vec::new(),
            shutdown,
        }
    }

    /// Spawns the supervisor unless its partition is already running here.
    pub fn start(&mut self, supervisor: PartitionSupervisor) -> Result<SupervisorHandle, RegistryError> {
        let partition_id = supervisor.partition_id().to_string();
        if let Some(existing) = self.running.get(&partition_id)
            && !existing.task.is_finished()
        {
            return Err(RegistryError::AlreadyRunning { partition_id });
        }

        let handle = supervisor.handle();
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(supervisor.run(shutdown));

        if let Some(previous) = self.running.insert(
            partition_id.clone(),
            RunningPartition {
                handle: handle.clone(),
                task,
            },
        ) {
            debug!(partition = %partition_id, "Keeping unreaped outcome of previous supervisor");
            self.retired.push((partition_id.clone(), previous.task));
        }
        info!(partition = %partition_id, "Supervisor started");
        Ok(handle)
    }

    pub fn get(&self, partition_id: &str) -> Option<&SupervisorHandle> {
        self.running.get(partition_id).map(|p| &p.handle)
    }

    pub fn contains(&self, partition_id: &str) -> bool {
        self.running.contains_key(partition_id)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn partition_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.running.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Cancels one partition. Returns whether it was registered.
    pub fn stop(&self, partition_id: &str) -> bool {
        match self.running.get(partition_id) {
            Some(partition) => {
                partition.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes finished supervisors and returns their outcomes, including
    /// those of supervisors replaced by a restart.
    pub async fn reap(&mut self) -> Vec<StopOutcome> {
        let mut outcomes = self.join_retired().await;

        let finished: Vec<String> = self
            .running
            .iter()
            .filter(|(_, p)| p.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for partition_id in finished {
            if let Some(partition) = self.running.remove(&partition_id) {
                outcomes.extend(Self::join(&partition_id, partition.task).await);
            }
        }
        outcomes
    }

    /// Waits until every registered supervisor has stopped on its own.
    pub async fn wait_all_stopped(&self) {
        for partition in self.running.values() {
            partition.handle.wait_stopped().await;
        }
    }

    /// Cancels every supervisor and waits for all of them.
    pub async fn shutdown_all(&mut self) -> Vec<StopOutcome> {
        info!(partitions = self.running.len(), "Stopping all supervisors");
        for partition in self.running.values() {
            partition.handle.cancel();
        }

        let mut outcomes = self.join_retired().await;
        let mut drained: Vec<_> = self.running.drain().collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        for (partition_id, partition) in drained {
            outcomes.extend(Self::join(&partition_id, partition.task).await);
        }
        outcomes
    }

    async fn join_retired(&mut self) -> Vec<StopOutcome> {
        let mut outcomes = Vec::with_capacity(self.retired.len());
        for (partition_id, task) in std::mem::take(&mut self.retired) {
            outcomes.extend(Self::join(&partition_id, task).await);
        }
        outcomes
    }

    async fn join(partition_id: &str, task: JoinHandle<StopOutcome>) -> Option<StopOutcome> {
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(partition = %partition_id, error = %e, "Supervisor task failed");
                None
            }
        }
    }
}
