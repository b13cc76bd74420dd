//! Trend strength indicators and pivot points.

use serde::{Deserialize, Serialize};

use crate::traits::wilder_smooth;

/// ADX/DMI output values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdxDmiOutput {
    /// Average Directional Index (trend strength, 0..100)
    pub adx: f64,
    /// Positive Directional Indicator
    pub plus_di: f64,
    /// Negative Directional Indicator
    pub minus_di: f64,
}

/// Average Directional Index with Directional Movement Indicators.
///
/// Directional movements and true ranges are Wilder-smoothed over the
/// period; ADX is a further Wilder smoothing of the DX series. Outputs
/// start once the double smoothing is warm (2 * period bars of movement).
#[derive(Debug, Clone)]
pub struct AdxDmi {
    period: usize,
}

impl AdxDmi {
    /// Create a new ADX/DMI indicator. The conventional period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }

    /// Minimum bars required for a first output.
    pub fn period(&self) -> usize {
        2 * self.period + 1
    }

    /// Calculate from OHLC data.
    pub fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<AdxDmiOutput> {
        let len = high.len().min(low.len()).min(close.len());
        if len < self.period() {
            return vec![];
        }

        let mut tr = Vec::with_capacity(len - 1);
        let mut plus_dm = Vec::with_capacity(len - 1);
        let mut minus_dm = Vec::with_capacity(len - 1);

        for i in 1..len {
            let high_low = high[i] - low[i];
            let high_close = (high[i] - close[i - 1]).abs();
            let low_close = (low[i] - close[i - 1]).abs();
            tr.push(high_low.max(high_close).max(low_close));

            let up_move = high[i] - high[i - 1];
            let down_move = low[i - 1] - low[i];
            plus_dm.push(if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            });
            minus_dm.push(if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            });
        }

        let smoothed_tr = wilder_smooth(&tr, self.period);
        let smoothed_plus = wilder_smooth(&plus_dm, self.period);
        let smoothed_minus = wilder_smooth(&minus_dm, self.period);

        let mut plus_di = Vec::with_capacity(smoothed_tr.len());
        let mut minus_di = Vec::with_capacity(smoothed_tr.len());
        let mut dx = Vec::with_capacity(smoothed_tr.len());

        for i in 0..smoothed_tr.len() {
            let (p, m) = if smoothed_tr[i] == 0.0 {
                (0.0, 0.0)
            } else {
                (
                    100.0 * smoothed_plus[i] / smoothed_tr[i],
                    100.0 * smoothed_minus[i] / smoothed_tr[i],
                )
            };
            plus_di.push(p);
            minus_di.push(m);

            let sum = p + m;
            dx.push(if sum == 0.0 {
                0.0
            } else {
                100.0 * (p - m).abs() / sum
            });
        }

        let adx = wilder_smooth(&dx, self.period);
        if adx.is_empty() {
            return vec![];
        }

        // ADX lags the DI series by period - 1; align on the tail
        let offset = plus_di.len() - adx.len();
        adx.iter()
            .enumerate()
            .map(|(i, &adx_val)| AdxDmiOutput {
                adx: adx_val,
                plus_di: plus_di[offset + i],
                minus_di: minus_di[offset + i],
            })
            .collect()
    }
}

/// Classic floor-trader pivot levels from one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
}

/// Calculate pivot levels from the prior bar's high, low and close.
pub fn pivot_point(high: f64, low: f64, close: f64) -> PivotLevels {
    let pivot = (high + low + close) / 3.0;
    PivotLevels {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + (high - low),
        s1: 2.0 * pivot - high,
        s2: pivot - (high - low),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let high: Vec<f64> = (0..n).map(|i| 105.0 + i as f64).collect();
        let low: Vec<f64> = (0..n).map(|i| 95.0 + i as f64).collect();
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        (high, low, close)
    }

    #[test]
    fn test_adx_strong_uptrend() {
        let adx = AdxDmi::new(14);
        let (high, low, close) = trending_up(60);
        let result = adx.calculate_ohlc(&high, &low, &close);

        assert!(!result.is_empty());
        let last = result.last().unwrap();
        // Relentless uptrend: +DI dominates and trend strength is high
        assert!(last.plus_di > last.minus_di);
        assert!(last.adx > 25.0);
    }

    #[test]
    fn test_adx_strong_downtrend() {
        let adx = AdxDmi::new(14);
        let (mut high, mut low, mut close) = trending_up(60);
        high.reverse();
        low.reverse();
        close.reverse();
        let result = adx.calculate_ohlc(&high, &low, &close);

        assert!(!result.is_empty());
        let last = result.last().unwrap();
        assert!(last.minus_di > last.plus_di);
        assert!(last.adx > 25.0);
    }

    #[test]
    fn test_adx_values_bounded() {
        let adx = AdxDmi::new(14);
        let high: Vec<f64> = (0..60).map(|i| 105.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let low: Vec<f64> = (0..60).map(|i| 95.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let close: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();

        for out in adx.calculate_ohlc(&high, &low, &close) {
            assert!(out.adx >= 0.0 && out.adx <= 100.0);
            assert!(out.plus_di >= 0.0 && out.plus_di <= 100.0);
            assert!(out.minus_di >= 0.0 && out.minus_di <= 100.0);
        }
    }

    #[test]
    fn test_adx_insufficient_data() {
        let adx = AdxDmi::new(14);
        let (high, low, close) = trending_up(20);
        assert!(adx.calculate_ohlc(&high, &low, &close).is_empty());
    }

    #[test]
    fn test_pivot_levels() {
        let levels = pivot_point(110.0, 90.0, 100.0);

        assert!((levels.pivot - 100.0).abs() < 1e-10);
        assert!((levels.r1 - 110.0).abs() < 1e-10);
        assert!((levels.r2 - 120.0).abs() < 1e-10);
        assert!((levels.s1 - 90.0).abs() < 1e-10);
        assert!((levels.s2 - 80.0).abs() < 1e-10);
    }
}
