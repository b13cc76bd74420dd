//! Core data types for the trading decision engine.

mod account;
mod bar;
mod intent;
mod order;
mod snapshot;
mod trade;

pub use account::RiskProfile;
pub use bar::{PriceBar, PriceSeries};
pub use intent::{IntentPurpose, TradeIntent};
pub use order::{Order, OrderStatus, OrderType, Side};
pub use snapshot::{ConfigLevel, IndicatorSnapshot, PriorityFlag, Tier};
pub use trade::{InstrumentClass, OpenLot, PositionView, Trade};
