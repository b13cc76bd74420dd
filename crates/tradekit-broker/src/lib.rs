//! Broker gateway implementations.
//!
//! Concrete gateways ([`AlpacaGateway`], [`RobinhoodGateway`], and the
//! in-process [`PaperGateway`]) plus the [`ResilientGateway`] wrapper
//! that adds per-call deadlines, bounded retry with exponential backoff,
//! and a circuit breaker.

pub mod alpaca;
pub mod breaker;
pub mod paper;
pub mod resilient;
pub mod retry;
pub mod robinhood;

pub use alpaca::{AlpacaConfig, AlpacaGateway};
pub use breaker::{BreakerState, CircuitBreaker};
pub use paper::PaperGateway;
pub use resilient::ResilientGateway;
pub use retry::RetryPolicy;
pub use robinhood::{RobinhoodConfig, RobinhoodGateway};
