//! Technical indicators for the trading decision engine.
//!
//! Batch indicators over f64 price slices, plus a [`SnapshotBuilder`] that
//! assembles a full [`tradekit_core::IndicatorSnapshot`] from a bar series.

pub mod momentum;
pub mod moving_average;
pub mod snapshot;
pub mod traits;
pub mod trend;
pub mod volatility;

pub use momentum::{Cci, Macd, MacdOutput, Rsi, Stochastic, StochasticOutput};
pub use moving_average::{Ema, Sma};
pub use snapshot::{IndicatorParams, SnapshotBuilder};
pub use traits::{Indicator, MultiOutputIndicator};
pub use trend::{pivot_point, AdxDmi, AdxDmiOutput, PivotLevels};
pub use volatility::{BollingerBands, BollingerOutput, StdDev};
