//! Core types and traits for the trading decision engine.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (PriceBar, PriceSeries, IndicatorSnapshot)
//! - Order, trade and open-lot types for the ledger
//! - Trade intents and priority flags
//! - Seam traits for the broker gateway, price feed and record store

pub mod types;
pub mod traits;
pub mod error;

pub use error::{EngineError, EngineResult};
pub use types::*;
pub use traits::*;
