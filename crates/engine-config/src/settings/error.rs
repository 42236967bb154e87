use thiserror::Error;

/// Errors raised when loading or validating processor settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON or has unknown fields.
    #[error("Invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    /// One or more values are out of range. All violations are reported at once.
    #[error("Settings validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}
