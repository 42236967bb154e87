use crate::supervisor::state::{StopReason, SupervisorState};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Observes and stops a supervisor from outside its task.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    partition_id: Arc<str>,
    state: watch::Receiver<SupervisorState>,
    cancel: CancellationToken,
}

impl SupervisorHandle {
    pub(crate) fn new(
        partition_id: &str,
        state: watch::Receiver<SupervisorState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            partition_id: Arc::from(partition_id),
            state,
            cancel,
        }
    }

    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    pub fn state(&self) -> SupervisorState {
        self.state.borrow().clone()
    }

    /// Requests a cooperative stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.borrow().is_stopped()
    }

    /// Resolves once the supervisor reached `Stopped`. `None` if it was
    /// dropped without ever running.
    pub async fn wait_stopped(&self) -> Option<StopReason> {
        let mut state = self.state.clone();
        let stopped = state.wait_for(SupervisorState::is_stopped).await.ok()?;
        match &*stopped {
            SupervisorState::Stopped(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}
