//! Configuration management.
//!
//! Two pieces: [`Settings`] is the application's static configuration
//! loaded from file plus environment, and [`LayeredConfig`] is the
//! three-level runtime parameter store (global, market segment,
//! instrument) strategies resolve their tuning keys from.

mod layered;
mod settings;

pub use layered::LayeredConfig;
pub use settings::{
    AccountSettings, AppSettings, BrokerSettings, LoggingSettings, ParamSettings,
    SchedulerSettings, Settings,
};

use config::{Config, Environment, File};
use std::path::Path;

/// Load settings from a file and `TRADEKIT__`-prefixed environment
/// variables. Environment values override the file.
pub fn load_settings(path: &Path) -> Result<Settings, config::ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADEKIT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

/// Range checks that deserialization alone cannot express.
fn validate(settings: &Settings) -> Result<(), config::ConfigError> {
    if settings.scheduler.nightly_hour_utc >= 24 {
        return Err(config::ConfigError::Message(format!(
            "scheduler.nightly_hour_utc must be 0-23, got {}",
            settings.scheduler.nightly_hour_utc
        )));
    }
    Ok(())
}
