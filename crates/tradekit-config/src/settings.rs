//! Static application settings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
    /// Instruments to monitor
    #[serde(default)]
    pub watchlist: Vec<String>,
    /// Runtime strategy parameters
    #[serde(default)]
    pub params: ParamSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "tradekit".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Broker gateway configuration. Credentials are read from the named
/// environment variables, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// "alpaca", "robinhood" or "paper"
    pub provider: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub base_url: String,
    /// Per-call deadline in seconds
    pub request_timeout_secs: u64,
    /// Consecutive failures before the circuit opens
    pub breaker_threshold: u32,
    /// Seconds the circuit stays open
    pub breaker_cooldown_secs: u64,
    pub max_retries: u32,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            provider: "paper".to_string(),
            api_key_env: "TRADEKIT_API_KEY".to_string(),
            api_secret_env: "TRADEKIT_API_SECRET".to_string(),
            base_url: "https://paper-api.alpaca.markets".to_string(),
            request_timeout_secs: 10,
            breaker_threshold: 5,
            breaker_cooldown_secs: 60,
            max_retries: 3,
        }
    }
}

/// Monitoring cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between passes over priority-tier instruments
    pub priority_interval_secs: u64,
    /// Seconds between passes over normal-tier instruments
    pub normal_interval_secs: u64,
    /// Hour (UTC) the nightly re-scoring pass runs
    pub nightly_hour_utc: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            priority_interval_secs: 60,
            normal_interval_secs: 300,
            nightly_hour_utc: 2,
        }
    }
}

/// One trading account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub account_id: i64,
    pub balance: Decimal,
    pub risk_fraction: Decimal,
    pub min_balance_floor: Decimal,
    pub day_trade_limit: u32,
    /// Whether strategies may propose option intents for this account
    pub options_enabled: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            account_id: 0,
            balance: Decimal::ZERO,
            risk_fraction: dec!(0.02),
            min_balance_floor: Decimal::ZERO,
            day_trade_limit: 3,
            options_enabled: false,
        }
    }
}

/// Runtime tuning parameters in their on-disk form, feeding the layered
/// store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSettings {
    #[serde(default)]
    pub global: std::collections::HashMap<String, String>,
    /// Per-segment overrides, keyed by segment name
    #[serde(default)]
    pub segments: std::collections::HashMap<String, std::collections::HashMap<String, String>>,
    /// Per-instrument overrides, keyed by symbol
    #[serde(default)]
    pub instruments: std::collections::HashMap<String, std::collections::HashMap<String, String>>,
    /// Maps symbol to segment
    #[serde(default)]
    pub segment_of: std::collections::HashMap<String, String>,
}

impl ParamSettings {
    /// Build the layered runtime store.
    pub fn to_layered(&self) -> crate::LayeredConfig {
        let mut layered = crate::LayeredConfig::new();
        for (key, value) in &self.global {
            layered.set_global(key, value);
        }
        for (segment, entries) in &self.segments {
            for (key, value) in entries {
                layered.set_segment(segment, key, value);
            }
        }
        for (symbol, entries) in &self.instruments {
            for (key, value) in entries {
                layered.set_instrument(symbol, key, value);
            }
        }
        for (symbol, segment) in &self.segment_of {
            layered.assign_segment(symbol, segment);
        }
        layered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.broker.provider, "paper");
        assert_eq!(settings.scheduler.priority_interval_secs, 60);
        assert!(settings.watchlist.is_empty());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let raw = r#"
            watchlist = ["AAPL", "MSFT"]

            [broker]
            provider = "alpaca"
            api_key_env = "ALPACA_KEY"
            api_secret_env = "ALPACA_SECRET"
            base_url = "https://paper-api.alpaca.markets"
            request_timeout_secs = 5
            breaker_threshold = 3
            breaker_cooldown_secs = 30
            max_retries = 2

            [[accounts]]
            account_id = 7
            balance = "25000"
            risk_fraction = "0.02"
            min_balance_floor = "1000"
            day_trade_limit = 3
            options_enabled = true
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();

        assert_eq!(settings.watchlist.len(), 2);
        assert_eq!(settings.broker.provider, "alpaca");
        assert_eq!(settings.accounts[0].account_id, 7);
        assert!(settings.accounts[0].options_enabled);
        // Unspecified sections keep their defaults
        assert_eq!(settings.logging.level, "info");
    }
}
