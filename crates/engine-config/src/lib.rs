pub mod settings;

pub use settings::{
    ProcessorSettings, error::SettingsError, validated::ValidatedSettings,
    validator::SettingsValidator,
};
