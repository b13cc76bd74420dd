//! Priority scoring.
//!
//! Instruments whose close has wandered more than a threshold number of
//! standard deviations from their moving average get promoted to the
//! fast monitoring tier. Cheap instruments stay normal regardless of
//! deviation since their percentage moves are noisy.

use tracing::debug;

use tradekit_config::LayeredConfig;
use tradekit_core::error::ConfigError;
use tradekit_core::types::{IndicatorSnapshot, PriorityFlag, Tier};

const DEFAULT_THRESHOLD: f64 = 1.0;
const DEFAULT_MIN_PRICE: f64 = 5.0;

/// Scores snapshots into monitoring tiers.
#[derive(Debug, Clone, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one snapshot.
    ///
    /// The deviation score is `(close - sma) / stdev`. A zero or missing
    /// stdev means the instrument has been flat or lacks history; both
    /// stay Normal with a zero score.
    pub fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        config: &LayeredConfig,
    ) -> Result<PriorityFlag, ConfigError> {
        let (threshold, source_level) =
            config.get_f64_or(&snapshot.symbol, "priority.threshold", DEFAULT_THRESHOLD)?;
        let (min_price, _) =
            config.get_f64_or(&snapshot.symbol, "priority.min_price", DEFAULT_MIN_PRICE)?;

        let (score, tier) = match (snapshot.sma21, snapshot.stdev21) {
            (Some(sma), Some(stdev)) if stdev > 0.0 => {
                let score = (snapshot.close - sma) / stdev;
                let tier = if score.abs() > threshold && snapshot.close > min_price {
                    Tier::Priority
                } else {
                    Tier::Normal
                };
                (score, tier)
            }
            _ => (0.0, Tier::Normal),
        };

        debug!(
            symbol = %snapshot.symbol,
            score,
            %tier,
            level = %source_level,
            "priority evaluated"
        );

        Ok(PriorityFlag {
            symbol: snapshot.symbol.clone(),
            timestamp: snapshot.timestamp,
            score,
            tier,
            source_level,
        })
    }
}
