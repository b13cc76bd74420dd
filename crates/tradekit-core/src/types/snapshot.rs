//! Indicator snapshots and priority flags.

use serde::{Deserialize, Serialize};

/// Point-in-time indicator values for one instrument.
///
/// Indicators that lack sufficient history are None rather than zero so
/// downstream consumers can tell "not yet computable" from a real value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    /// Timestamp of the bar the snapshot was computed from (ms).
    pub timestamp: i64,
    pub close: f64,
    pub sma21: Option<f64>,
    pub stdev21: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub cci: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_lower: Option<f64>,
    /// Classic pivot point from the prior bar.
    pub pivot: Option<f64>,
}

impl IndicatorSnapshot {
    /// Create an empty snapshot carrying only the close.
    pub fn bare(symbol: impl Into<String>, timestamp: i64, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            close,
            sma21: None,
            stdev21: None,
            rsi14: None,
            macd: None,
            macd_signal: None,
            stoch_k: None,
            stoch_d: None,
            adx: None,
            plus_di: None,
            minus_di: None,
            cci: None,
            bollinger_upper: None,
            bollinger_lower: None,
            pivot: None,
        }
    }
}

/// Monitoring tier assigned by the priority scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Scanned on the slow cycle.
    Normal,
    /// Unusual deviation; scanned on the fast cycle.
    Priority,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Normal => write!(f, "normal"),
            Tier::Priority => write!(f, "priority"),
        }
    }
}

/// Which layer a resolved configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLevel {
    Global,
    Segment,
    Instrument,
}

impl std::fmt::Display for ConfigLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLevel::Global => write!(f, "global"),
            ConfigLevel::Segment => write!(f, "segment"),
            ConfigLevel::Instrument => write!(f, "instrument"),
        }
    }
}

/// Outcome of a priority evaluation, archived for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityFlag {
    pub symbol: String,
    pub timestamp: i64,
    /// Deviation from the mean in standard deviations.
    pub score: f64,
    pub tier: Tier,
    /// Config layer the deviation threshold was resolved from.
    pub source_level: ConfigLevel,
}
