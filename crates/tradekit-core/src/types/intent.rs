//! Trade intents emitted by strategies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::Side;
use super::trade::InstrumentClass;

/// Whether the intent opens a new position or closes an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentPurpose {
    Enter,
    Exit,
}

/// A sizing-free trading decision. Quantity is assigned later by the risk
/// module; strategies only say what and which way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub instrument: InstrumentClass,
    pub purpose: IntentPurpose,
    /// Signal strength in [0, 1].
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

impl TradeIntent {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        instrument: InstrumentClass,
        purpose: IntentPurpose,
        confidence: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            instrument,
            purpose,
            confidence: confidence.clamp(0.0, 1.0),
            generated_at: Utc::now(),
        }
    }
}
