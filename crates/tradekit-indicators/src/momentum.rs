//! Momentum oscillators.

use serde::{Deserialize, Serialize};

use crate::traits::{wilder_smooth, Indicator, MultiOutputIndicator};

/// Relative Strength Index (RSI).
///
/// Wilder-smoothed gains over losses, scaled to 0..100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    /// Create a new RSI indicator. The conventional period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() <= self.period {
            return vec![];
        }

        let mut gains = Vec::with_capacity(data.len() - 1);
        let mut losses = Vec::with_capacity(data.len() - 1);

        for pair in data.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains.push(change);
                losses.push(0.0);
            } else {
                gains.push(0.0);
                losses.push(-change);
            }
        }

        let avg_gains = wilder_smooth(&gains, self.period);
        let avg_losses = wilder_smooth(&losses, self.period);

        avg_gains
            .iter()
            .zip(avg_losses.iter())
            .map(|(&gain, &loss)| {
                if loss == 0.0 {
                    100.0
                } else {
                    100.0 - (100.0 / (1.0 + gain / loss))
                }
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// MACD output values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdOutput {
    /// MACD line (fast EMA - slow EMA)
    pub macd: f64,
    /// Signal line (EMA of MACD)
    pub signal: f64,
    /// Histogram (MACD - Signal)
    pub histogram: f64,
}

/// Moving Average Convergence Divergence.
#[derive(Debug, Clone)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    /// Create a new MACD with default parameters (12, 26, 9).
    pub fn new() -> Self {
        Self::with_periods(12, 26, 9)
    }

    /// Create a MACD with custom periods.
    pub fn with_periods(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast > 0 && slow > 0 && signal > 0);
        assert!(fast < slow, "Fast period must be less than slow period");
        Self {
            fast_period: fast,
            slow_period: slow,
            signal_period: signal,
        }
    }

    fn ema(data: &[f64], period: usize) -> Vec<f64> {
        if data.len() < period {
            return vec![];
        }

        let multiplier = 2.0 / (period as f64 + 1.0);
        let mut result = Vec::with_capacity(data.len() - period + 1);

        let sma: f64 = data[..period].iter().sum::<f64>() / period as f64;
        result.push(sma);

        let mut ema = sma;
        for &price in &data[period..] {
            ema = price * multiplier + ema * (1.0 - multiplier);
            result.push(ema);
        }

        result
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiOutputIndicator for Macd {
    type Outputs = MacdOutput;

    fn calculate(&self, data: &[f64]) -> Vec<MacdOutput> {
        if data.len() < self.slow_period + self.signal_period {
            return vec![];
        }

        let fast_ema = Self::ema(data, self.fast_period);
        let slow_ema = Self::ema(data, self.slow_period);

        // The fast EMA warms up earlier; drop its head to align
        let offset = self.slow_period - self.fast_period;
        let fast_ema = &fast_ema[offset..];

        let macd_line: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        if macd_line.len() < self.signal_period {
            return vec![];
        }

        let signal_line = Self::ema(&macd_line, self.signal_period);

        let offset = self.signal_period - 1;
        macd_line[offset..]
            .iter()
            .zip(signal_line.iter())
            .map(|(&macd, &signal)| MacdOutput {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.slow_period + self.signal_period
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

/// Stochastic oscillator output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StochasticOutput {
    /// %K (fast stochastic)
    pub k: f64,
    /// %D (SMA of %K)
    pub d: f64,
}

/// Stochastic oscillator.
///
/// Positions the close within the high/low range of the lookback window.
#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

impl Stochastic {
    /// Create a new stochastic oscillator with default parameters (14, 3).
    pub fn new() -> Self {
        Self::with_periods(14, 3)
    }

    /// Create with custom periods.
    pub fn with_periods(k_period: usize, d_period: usize) -> Self {
        assert!(k_period > 0 && d_period > 0);
        Self { k_period, d_period }
    }

    /// Calculate from OHLC data.
    pub fn calculate_ohlc(
        &self,
        high: &[f64],
        low: &[f64],
        close: &[f64],
    ) -> Vec<StochasticOutput> {
        let len = high.len().min(low.len()).min(close.len());
        if len < self.k_period + self.d_period - 1 {
            return vec![];
        }

        let mut k_values = Vec::with_capacity(len - self.k_period + 1);

        for i in (self.k_period - 1)..len {
            let start = i + 1 - self.k_period;
            let highest = high[start..=i]
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            let lowest = low[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);

            let range = highest - lowest;
            let k = if range == 0.0 {
                // Flat range, use midpoint
                50.0
            } else {
                ((close[i] - lowest) / range) * 100.0
            };
            k_values.push(k);
        }

        if k_values.len() < self.d_period {
            return vec![];
        }

        let d_period_f64 = self.d_period as f64;
        let mut result = Vec::with_capacity(k_values.len() - self.d_period + 1);

        for i in (self.d_period - 1)..k_values.len() {
            let k = k_values[i];
            let d: f64 = k_values[(i + 1 - self.d_period)..=i].iter().sum::<f64>() / d_period_f64;
            result.push(StochasticOutput { k, d });
        }

        result
    }

    /// Minimum bars required.
    pub fn period(&self) -> usize {
        self.k_period + self.d_period - 1
    }
}

impl Default for Stochastic {
    fn default() -> Self {
        Self::new()
    }
}

/// Commodity Channel Index (CCI).
///
/// `(tp - sma(tp)) / (0.015 * mean_deviation)` over the typical price.
#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
}

impl Cci {
    /// Create a new CCI indicator. The conventional period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }

    /// Calculate from OHLC data using the typical price (H+L+C)/3.
    pub fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
        let len = high.len().min(low.len()).min(close.len());
        let tp: Vec<f64> = (0..len)
            .map(|i| (high[i] + low[i] + close[i]) / 3.0)
            .collect();
        self.calculate(&tp)
    }
}

impl Indicator for Cci {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let period_f64 = self.period as f64;
        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        for (i, window) in data.windows(self.period).enumerate() {
            let mean: f64 = window.iter().sum::<f64>() / period_f64;
            let mean_dev: f64 =
                window.iter().map(|x| (x - mean).abs()).sum::<f64>() / period_f64;

            let value = data[self.period - 1 + i];
            let cci = if mean_dev == 0.0 {
                0.0
            } else {
                (value - mean) / (0.015 * mean_dev)
            };
            result.push(cci);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "CCI"
    }
}
