//! Three-level runtime parameter store.

use std::collections::HashMap;

use tradekit_core::error::ConfigError;
use tradekit_core::types::ConfigLevel;

/// Runtime tuning parameters resolved per instrument.
///
/// Values cascade: an instrument-level entry beats its market segment's
/// entry, which beats the global entry. Resolution reports which level
/// won so archived decisions can name their source.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    global: HashMap<String, String>,
    /// Keyed by (segment, key)
    segment: HashMap<(String, String), String>,
    /// Keyed by (symbol, key)
    instrument: HashMap<(String, String), String>,
    /// Maps symbol to its market segment
    segments: HashMap<String, String>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a global value.
    pub fn set_global(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.global.insert(key.into(), value.into());
    }

    /// Set a value for every instrument in a market segment.
    pub fn set_segment(
        &mut self,
        segment: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.segment
            .insert((segment.into(), key.into()), value.into());
    }

    /// Set a value for one instrument.
    pub fn set_instrument(
        &mut self,
        symbol: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.instrument
            .insert((symbol.into(), key.into()), value.into());
    }

    /// Assign an instrument to a market segment.
    pub fn assign_segment(&mut self, symbol: impl Into<String>, segment: impl Into<String>) {
        self.segments.insert(symbol.into(), segment.into());
    }

    /// Resolve a key for an instrument, returning the value and the level
    /// it came from.
    pub fn resolve(&self, symbol: &str, key: &str) -> Option<(&str, ConfigLevel)> {
        if let Some(value) = self
            .instrument
            .get(&(symbol.to_string(), key.to_string()))
        {
            return Some((value, ConfigLevel::Instrument));
        }
        if let Some(segment) = self.segments.get(symbol) {
            if let Some(value) = self.segment.get(&(segment.clone(), key.to_string())) {
                return Some((value, ConfigLevel::Segment));
            }
        }
        self.global
            .get(key)
            .map(|value| (value.as_str(), ConfigLevel::Global))
    }

    /// Resolve a key or fail with [`ConfigError::Missing`].
    pub fn require(&self, symbol: &str, key: &str) -> Result<(&str, ConfigLevel), ConfigError> {
        self.resolve(symbol, key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Typed f64 getter.
    pub fn get_f64(&self, symbol: &str, key: &str) -> Result<(f64, ConfigLevel), ConfigError> {
        let (raw, level) = self.require(symbol, key)?;
        let parsed = raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        Ok((parsed, level))
    }

    /// Typed u32 getter.
    pub fn get_u32(&self, symbol: &str, key: &str) -> Result<(u32, ConfigLevel), ConfigError> {
        let (raw, level) = self.require(symbol, key)?;
        let parsed = raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        Ok((parsed, level))
    }

    /// Typed bool getter.
    pub fn get_bool(&self, symbol: &str, key: &str) -> Result<(bool, ConfigLevel), ConfigError> {
        let (raw, level) = self.require(symbol, key)?;
        let parsed = raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        Ok((parsed, level))
    }

    /// Typed f64 getter with a fallback when the key is absent at every
    /// level. A present-but-unparseable value is still an error.
    pub fn get_f64_or(
        &self,
        symbol: &str,
        key: &str,
        default: f64,
    ) -> Result<(f64, ConfigLevel), ConfigError> {
        match self.resolve(symbol, key) {
            Some((raw, level)) => {
                let parsed = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                })?;
                Ok((parsed, level))
            }
            None => Ok((default, ConfigLevel::Global)),
        }
    }

    /// Typed bool getter with a fallback.
    pub fn get_bool_or(
        &self,
        symbol: &str,
        key: &str,
        default: bool,
    ) -> Result<(bool, ConfigLevel), ConfigError> {
        match self.resolve(symbol, key) {
            Some((raw, level)) => {
                let parsed = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.to_string(),
                })?;
                Ok((parsed, level))
            }
            None => Ok((default, ConfigLevel::Global)),
        }
    }
}
