use engine_config::settings::validated::ValidatedSettings;
use engine_processing::{feed::config::FeedProcessorConfig, renewer::config::RenewerConfig};

/// Configuration for one partition supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub renewer: RenewerConfig,
    pub feed: FeedProcessorConfig,

    /// Hand the lease back on a clean or locally-caused stop
    pub release_on_stop: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            renewer: RenewerConfig::default(),
            feed: FeedProcessorConfig::default(),
            release_on_stop: true,
        }
    }
}

impl SupervisorConfig {
    pub fn from_settings(settings: &ValidatedSettings) -> Self {
        Self {
            renewer: RenewerConfig::from_settings(settings),
            feed: FeedProcessorConfig::from_settings(settings),
            release_on_stop: settings.release_on_stop,
        }
    }

    pub fn with_renewer(mut self, renewer: RenewerConfig) -> Self {
        self.renewer = renewer;
        self
    }

    pub fn with_feed(mut self, feed: FeedProcessorConfig) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_release_on_stop(mut self, release: bool) -> Self {
        self.release_on_stop = release;
        self
    }
}
