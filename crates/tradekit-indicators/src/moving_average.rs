//! Moving averages.

use crate::traits::Indicator;

/// Simple Moving Average (SMA).
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Create a new SMA indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let period_f64 = self.period as f64;
        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        // Rolling sum instead of re-summing each window
        let mut sum: f64 = data[..self.period].iter().sum();
        result.push(sum / period_f64);

        for i in self.period..data.len() {
            sum += data[i] - data[i - self.period];
            result.push(sum / period_f64);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Exponential Moving Average (EMA).
///
/// Seeded with an SMA over the first period, then
/// `ema = price * k + ema * (1 - k)` with `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
}

impl Ema {
    /// Create a new EMA indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let multiplier = 2.0 / (self.period as f64 + 1.0);
        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        let sma: f64 = data[..self.period].iter().sum::<f64>() / self.period as f64;
        result.push(sma);

        let mut ema = sma;
        for &price in &data[self.period..] {
            ema = price * multiplier + ema * (1.0 - multiplier);
            result.push(ema);
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "EMA"
    }
}
