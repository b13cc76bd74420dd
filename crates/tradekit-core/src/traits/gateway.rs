//! Broker gateway trait and its support types.

use crate::error::BrokerError;
use crate::types::{InstrumentClass, Order, OrderStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A real-time quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    /// Timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl Quote {
    /// Get the mid price.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Get the spread.
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// One contract from an options chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub class: InstrumentClass,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub bid: f64,
    pub ask: f64,
}

/// Broker acknowledgement of a submitted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub broker_order_id: String,
}

/// One fill reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillReport {
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Current broker-side view of an order, used for reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    /// All fills reported so far, oldest first.
    pub fills: Vec<FillReport>,
}

/// A position as the broker reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
}

/// Trait for broker integrations.
///
/// Gateways handle order routing, quotes and broker-side position state.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Get the latest quote for a symbol.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, BrokerError>;

    /// Get the options chain for an underlying.
    async fn get_options_chain(&self, symbol: &str) -> Result<Vec<OptionContract>, BrokerError>;

    /// Submit an order. A successful return means the broker accepted it;
    /// a [`BrokerError::Timeout`] means the outcome is unknown.
    async fn submit_order(&self, order: &Order) -> Result<OrderAck, BrokerError>;

    /// Cancel a working order by its broker identifier.
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError>;

    /// Fetch the broker's current view of an order, including fills.
    async fn order_status(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError>;

    /// Find an order by the client-assigned identifier sent at submission.
    ///
    /// This is the recovery path for a timed-out submit, where no broker
    /// identifier was ever received. `Ok(None)` means the broker has no
    /// record of the order.
    async fn lookup_order(
        &self,
        client_order_id: &str,
    ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError>;

    /// Get all positions the broker holds for this account.
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Get the gateway name.
    fn name(&self) -> &str;
}
