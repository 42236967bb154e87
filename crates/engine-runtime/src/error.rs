use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A live supervisor already owns this partition in this process.
    #[error("Partition '{partition_id}' already has a running supervisor")]
    AlreadyRunning { partition_id: String },
}
