//! Directional momentum strategy.
//!
//! Trades only when ADX confirms a strong trend, then follows the
//! dominant directional indicator. With options enabled a bullish trend
//! buys calls and closes puts; bearish buys puts and closes calls.
//! Stock-only accounts buy or sell the underlying instead.

use rust_decimal::Decimal;
use tracing::debug;

use tradekit_config::LayeredConfig;
use tradekit_core::error::ConfigError;
use tradekit_core::types::{
    IndicatorSnapshot, InstrumentClass, IntentPurpose, PositionView, Side, TradeIntent,
};

const DEFAULT_ADX_THRESHOLD: f64 = 25.0;

/// Per-evaluation inputs beyond the snapshot itself.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    /// Net open quantities for this (account, symbol)
    pub position: PositionView,
    /// Whether the account may trade options
    pub options_enabled: bool,
}

/// ADX/DMI trend-following strategy. Emits sizing-free intents;
/// re-evaluating against an already-consistent position emits nothing.
#[derive(Debug, Clone, Default)]
pub struct MomentumStrategy;

impl MomentumStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a snapshot, returning zero or more intents (an exit for
    /// the opposing position plus an entry, at most).
    pub fn evaluate(
        &self,
        snapshot: &IndicatorSnapshot,
        ctx: &StrategyContext,
        config: &LayeredConfig,
    ) -> Result<Vec<TradeIntent>, ConfigError> {
        let (threshold, _) = config.get_f64_or(
            &snapshot.symbol,
            "strategy.adx_threshold",
            DEFAULT_ADX_THRESHOLD,
        )?;

        let (Some(adx), Some(plus_di), Some(minus_di)) =
            (snapshot.adx, snapshot.plus_di, snapshot.minus_di)
        else {
            return Ok(vec![]);
        };

        if adx <= threshold || plus_di == minus_di {
            debug!(symbol = %snapshot.symbol, adx, "trend too weak, no action");
            return Ok(vec![]);
        }

        let confidence = ((adx - threshold) / (100.0 - threshold)).clamp(0.0, 1.0);
        let bullish = plus_di > minus_di;
        let mut intents = Vec::new();

        if bullish {
            // Close any put exposure before going long
            if ctx.position.puts > Decimal::ZERO {
                intents.push(TradeIntent::new(
                    &snapshot.symbol,
                    Side::Sell,
                    InstrumentClass::Put,
                    IntentPurpose::Exit,
                    confidence,
                ));
            }

            let (instrument, held) = if ctx.options_enabled {
                (InstrumentClass::Call, ctx.position.calls)
            } else {
                (InstrumentClass::Stock, ctx.position.stock)
            };
            if held <= Decimal::ZERO {
                intents.push(TradeIntent::new(
                    &snapshot.symbol,
                    Side::Buy,
                    instrument,
                    IntentPurpose::Enter,
                    confidence,
                ));
            }
        } else {
            if ctx.position.calls > Decimal::ZERO {
                intents.push(TradeIntent::new(
                    &snapshot.symbol,
                    Side::Sell,
                    InstrumentClass::Call,
                    IntentPurpose::Exit,
                    confidence,
                ));
            }

            if ctx.options_enabled {
                if ctx.position.puts <= Decimal::ZERO {
                    intents.push(TradeIntent::new(
                        &snapshot.symbol,
                        Side::Buy,
                        InstrumentClass::Put,
                        IntentPurpose::Enter,
                        confidence,
                    ));
                }
            } else if ctx.position.stock > Decimal::ZERO {
                // Stock-only accounts can only step aside
                intents.push(TradeIntent::new(
                    &snapshot.symbol,
                    Side::Sell,
                    InstrumentClass::Stock,
                    IntentPurpose::Exit,
                    confidence,
                ));
            }
        }

        debug!(
            symbol = %snapshot.symbol,
            adx,
            plus_di,
            minus_di,
            intents = intents.len(),
            "momentum evaluated"
        );

        Ok(intents)
    }
}
