pub mod error;
pub mod estimator;
pub mod factory;
pub mod registry;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub use estimator::FeedEstimator;
pub use factory::PartitionSupervisorFactory;
pub use registry::PartitionRegistry;
pub use supervisor::{
    PartitionSupervisor,
    handle::SupervisorHandle,
    state::{StopOutcome, StopReason, SupervisorState},
};
