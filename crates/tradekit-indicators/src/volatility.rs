//! Volatility indicators.

use serde::{Deserialize, Serialize};

use crate::traits::{Indicator, MultiOutputIndicator};

/// Rolling sample standard deviation (n - 1 denominator).
#[derive(Debug, Clone)]
pub struct StdDev {
    period: usize,
}

impl StdDev {
    /// Create a new standard deviation indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "Period must be greater than 1");
        Self { period }
    }
}

impl Indicator for StdDev {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        let period_f64 = self.period as f64;
        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        for window in data.windows(self.period) {
            let mean: f64 = window.iter().sum::<f64>() / period_f64;
            let variance: f64 =
                window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period_f64 - 1.0);
            result.push(variance.sqrt());
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "StdDev"
    }
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BollingerOutput {
    pub upper: f64,
    /// Middle band (SMA)
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger Bands: SMA middle band with upper and lower bands at a
/// multiple of the sample standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    /// Create new Bollinger Bands with default parameters (21, 2.0).
    pub fn new() -> Self {
        Self::with_params(21, 2.0)
    }

    /// Create Bollinger Bands with custom parameters.
    pub fn with_params(period: usize, std_dev_multiplier: f64) -> Self {
        assert!(period > 1, "Period must be greater than 1");
        assert!(
            std_dev_multiplier > 0.0,
            "Std dev multiplier must be positive"
        );
        Self {
            period,
            std_dev_multiplier,
        }
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiOutputIndicator for BollingerBands {
    type Outputs = BollingerOutput;

    fn calculate(&self, data: &[f64]) -> Vec<BollingerOutput> {
        if data.len() < self.period {
            return vec![];
        }

        let period_f64 = self.period as f64;
        let mut result = Vec::with_capacity(data.len() - self.period + 1);

        for window in data.windows(self.period) {
            let mean: f64 = window.iter().sum::<f64>() / period_f64;
            let variance: f64 =
                window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period_f64 - 1.0);
            let std_dev = variance.sqrt();

            result.push(BollingerOutput {
                upper: mean + self.std_dev_multiplier * std_dev,
                middle: mean,
                lower: mean - self.std_dev_multiplier * std_dev,
            });
        }

        result
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "Bollinger Bands"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_dev_sample() {
        let std_dev = StdDev::new(3);
        let data = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let result = std_dev.calculate(&data);

        assert_eq!(result.len(), 3);
        // First window [2, 4, 6]: mean 4, sample variance (4+0+4)/2 = 4
        assert!((result[0] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_std_dev_constant_is_zero() {
        let std_dev = StdDev::new(4);
        let result = std_dev.calculate(&[5.0; 6]);

        for value in &result {
            assert!(value.abs() < 1e-10);
        }
    }

    #[test]
    fn test_bollinger_ordering() {
        let bb = BollingerBands::new();
        let data: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64 * 0.1).sin() * 5.0)
            .collect();

        let result = bb.calculate(&data);
        assert!(!result.is_empty());

        for output in &result {
            assert!(output.upper > output.middle);
            assert!(output.middle > output.lower);
        }
    }

    #[test]
    fn test_bollinger_collapses_on_constant_price() {
        let bb = BollingerBands::with_params(5, 2.0);
        let result = bb.calculate(&[100.0; 5]);

        assert_eq!(result.len(), 1);
        assert!((result[0].upper - 100.0).abs() < 1e-10);
        assert!((result[0].lower - 100.0).abs() < 1e-10);
    }
}
