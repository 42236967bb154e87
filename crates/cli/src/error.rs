use engine_config::settings::error::SettingsError;
use engine_core::error::StoreError;
use engine_runtime::error::RegistryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Lease store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to start partition: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
