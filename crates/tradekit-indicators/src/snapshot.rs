//! Snapshot assembly from a bar series.

use serde::{Deserialize, Serialize};
use tradekit_core::types::{IndicatorSnapshot, PriceSeries};

use crate::momentum::{Cci, Macd, Rsi, Stochastic};
use crate::moving_average::Sma;
use crate::traits::{Indicator, MultiOutputIndicator};
use crate::trend::{pivot_point, AdxDmi};
use crate::volatility::{BollingerBands, StdDev};

/// Periods for the full indicator set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub rsi_period: usize,
    pub adx_period: usize,
    pub cci_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_period: 21,
            rsi_period: 14,
            adx_period: 14,
            cci_period: 14,
            stoch_k_period: 14,
            stoch_d_period: 3,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_multiplier: 2.0,
        }
    }
}

/// Computes a full [`IndicatorSnapshot`] for the latest bar of a series.
///
/// Each indicator that lacks history is omitted (left None) rather than
/// failing the whole snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    params: IndicatorParams,
}

impl SnapshotBuilder {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    /// Build a snapshot from the latest bar, or None if the series is empty.
    pub fn build(&self, series: &PriceSeries) -> Option<IndicatorSnapshot> {
        let last = series.last()?;
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        let mut snap = IndicatorSnapshot::bare(series.symbol.clone(), last.timestamp, last.close);

        snap.sma21 = Sma::new(self.params.sma_period)
            .calculate(&closes)
            .last()
            .copied();
        snap.stdev21 = StdDev::new(self.params.sma_period)
            .calculate(&closes)
            .last()
            .copied();
        snap.rsi14 = Rsi::new(self.params.rsi_period)
            .calculate(&closes)
            .last()
            .copied();

        if let Some(macd) = Macd::with_periods(
            self.params.macd_fast,
            self.params.macd_slow,
            self.params.macd_signal,
        )
        .calculate(&closes)
        .last()
        {
            snap.macd = Some(macd.macd);
            snap.macd_signal = Some(macd.signal);
        }

        if let Some(stoch) =
            Stochastic::with_periods(self.params.stoch_k_period, self.params.stoch_d_period)
                .calculate_ohlc(&highs, &lows, &closes)
                .last()
        {
            snap.stoch_k = Some(stoch.k);
            snap.stoch_d = Some(stoch.d);
        }

        if let Some(adx) = AdxDmi::new(self.params.adx_period)
            .calculate_ohlc(&highs, &lows, &closes)
            .last()
        {
            snap.adx = Some(adx.adx);
            snap.plus_di = Some(adx.plus_di);
            snap.minus_di = Some(adx.minus_di);
        }

        snap.cci = Cci::new(self.params.cci_period)
            .calculate_ohlc(&highs, &lows, &closes)
            .last()
            .copied();

        if let Some(bb) = BollingerBands::with_params(
            self.params.sma_period,
            self.params.bollinger_multiplier,
        )
        .calculate(&closes)
        .last()
        {
            snap.bollinger_upper = Some(bb.upper);
            snap.bollinger_lower = Some(bb.lower);
        }

        // Pivot from the bar before the latest
        if series.len() >= 2 {
            let prev = series.get(series.len() - 2)?;
            snap.pivot = Some(pivot_point(prev.high, prev.low, prev.close).pivot);
        }

        Some(snap)
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(IndicatorParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradekit_core::types::PriceBar;

    fn series_of(n: usize) -> PriceSeries {
        let mut series = PriceSeries::new("AAPL");
        for i in 0..n {
            let base = 100.0 + (i as f64 * 0.3).sin() * 4.0;
            series.push(PriceBar::new(
                i as i64 * 86_400_000,
                base,
                base + 2.0,
                base - 2.0,
                base + 0.5,
                1_000_000.0,
            ));
        }
        series
    }

    #[test]
    fn test_empty_series_yields_none() {
        let builder = SnapshotBuilder::default();
        assert!(builder.build(&PriceSeries::new("AAPL")).is_none());
    }

    #[test]
    fn test_short_series_has_partial_snapshot() {
        let builder = SnapshotBuilder::default();
        let snap = builder.build(&series_of(5)).unwrap();

        // Close and pivot are always available with >= 2 bars
        assert!(snap.close > 0.0);
        assert!(snap.pivot.is_some());
        // Long-window indicators are not
        assert!(snap.sma21.is_none());
        assert!(snap.adx.is_none());
        assert!(snap.macd.is_none());
    }

    #[test]
    fn test_full_series_has_complete_snapshot() {
        let builder = SnapshotBuilder::default();
        let snap = builder.build(&series_of(80)).unwrap();

        assert!(snap.sma21.is_some());
        assert!(snap.stdev21.is_some());
        assert!(snap.rsi14.is_some());
        assert!(snap.macd.is_some());
        assert!(snap.macd_signal.is_some());
        assert!(snap.stoch_k.is_some());
        assert!(snap.stoch_d.is_some());
        assert!(snap.adx.is_some());
        assert!(snap.plus_di.is_some());
        assert!(snap.minus_di.is_some());
        assert!(snap.cci.is_some());
        assert!(snap.bollinger_upper.is_some());
        assert!(snap.bollinger_lower.is_some());
        assert!(snap.pivot.is_some());
    }

    #[test]
    fn test_snapshot_timestamp_matches_last_bar() {
        let builder = SnapshotBuilder::default();
        let series = series_of(30);
        let snap = builder.build(&series).unwrap();

        assert_eq!(snap.timestamp, series.last().unwrap().timestamp);
    }
}
