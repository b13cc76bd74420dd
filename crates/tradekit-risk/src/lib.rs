//! Position sizing and account-level gating.

pub mod sizing;

pub use sizing::PositionSizer;
