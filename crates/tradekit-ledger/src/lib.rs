//! Trade accounting and order lifecycle.
//!
//! [`LifoLedger`] matches closing trades against open lots most recent
//! first and computes realized P&L; [`OrderManager`] drives orders
//! through their state machine against a broker gateway.

pub mod lifecycle;
pub mod lifo;

pub use lifecycle::OrderManager;
pub use lifo::LifoLedger;
