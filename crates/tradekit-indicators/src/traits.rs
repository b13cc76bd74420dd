//! Indicator trait definitions.

use tradekit_core::error::IndicatorError;

/// Trait for single-output technical indicators.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// Returns one value per window once warm, oldest first. Returns an
    /// empty vector when the data is too short.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::DataGap {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// Multi-output indicator (e.g., Bollinger Bands, MACD, ADX/DMI).
pub trait MultiOutputIndicator: Send + Sync {
    /// The output type containing multiple values.
    type Outputs;

    /// Calculate indicator values for the given data.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Outputs>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::DataGap {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// Shared Wilder smoothing: initial SMA, then
/// `avg = (avg * (period - 1) + value) / period`.
pub(crate) fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return vec![];
    }

    let period_f64 = period as f64;
    let mut result = Vec::with_capacity(values.len() - period + 1);

    let mut avg: f64 = values[..period].iter().sum::<f64>() / period_f64;
    result.push(avg);

    for &value in &values[period..] {
        avg = (avg * (period_f64 - 1.0) + value) / period_f64;
        result.push(avg);
    }

    result
}
