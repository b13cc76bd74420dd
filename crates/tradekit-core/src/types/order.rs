//! Order types and the order state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trade::InstrumentClass;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed direction multiplier (+1 buy, -1 sell).
    pub fn sign(&self) -> i8 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit { price: Decimal },
}

/// Order lifecycle status.
///
/// Drafted -> Submitted -> Acknowledged -> PartiallyFilled -> Filled, with
/// Cancelled and Rejected as the other terminal states. A timed-out
/// submission stays Submitted until reconciliation resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created locally, not yet sent to the broker.
    Drafted,
    /// Sent to the broker; acceptance not yet confirmed.
    Submitted,
    /// Broker confirmed receipt.
    Acknowledged,
    /// Some quantity executed, remainder still working.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Cancelled before any execution.
    Cancelled,
    /// Refused by the broker.
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Active orders are working at the broker.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Acknowledged | OrderStatus::PartiallyFilled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Drafted => "drafted",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Acknowledged => "acknowledged",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// An order tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Engine-assigned identifier, stable across retries.
    pub id: Uuid,
    pub account_id: i64,
    pub symbol: String,
    pub instrument: InstrumentClass,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Broker-assigned identifier, set once submission is acknowledged.
    pub broker_order_id: Option<String>,
    pub filled_quantity: Decimal,
}

impl Order {
    /// Create a new order in the Drafted state.
    pub fn draft(
        account_id: i64,
        symbol: impl Into<String>,
        instrument: InstrumentClass,
        side: Side,
        quantity: Decimal,
        order_type: OrderType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            symbol: symbol.into(),
            instrument,
            side,
            quantity,
            order_type,
            status: OrderStatus::Drafted,
            created_at: Utc::now(),
            broker_order_id: None,
            filled_quantity: Decimal::ZERO,
        }
    }

    /// Quantity still working at the broker.
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    /// Whether any quantity has executed.
    pub fn has_fills(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite_and_sign() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }

    #[test]
    fn test_status_classification() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());

        assert!(OrderStatus::Submitted.is_active());
        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(!OrderStatus::Drafted.is_active());
        assert!(!OrderStatus::Filled.is_active());
    }

    #[test]
    fn test_draft_order() {
        let order = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        );
        assert_eq!(order.status, OrderStatus::Drafted);
        assert_eq!(order.remaining_quantity(), dec!(10));
        assert!(!order.has_fills());
        assert!(order.broker_order_id.is_none());
    }
}
