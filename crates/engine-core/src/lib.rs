pub mod backoff;
pub mod connectors;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod retry;
pub mod state;
