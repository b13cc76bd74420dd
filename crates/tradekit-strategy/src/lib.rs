//! Trading strategies.
//!
//! [`PriorityScorer`] assigns monitoring tiers from mean deviation;
//! [`MomentumStrategy`] turns ADX/DMI readings into sizing-free trade
//! intents.

pub mod momentum;
pub mod priority;

pub use momentum::{MomentumStrategy, StrategyContext};
pub use priority::PriorityScorer;
