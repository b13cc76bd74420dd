//! Executed trades, open lots and position views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::Side;

/// Instrument class traded by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    Stock,
    Call,
    Put,
}

impl InstrumentClass {
    pub fn is_option(&self) -> bool {
        matches!(self, InstrumentClass::Call | InstrumentClass::Put)
    }
}

impl std::fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentClass::Stock => write!(f, "stock"),
            InstrumentClass::Call => write!(f, "call"),
            InstrumentClass::Put => write!(f, "put"),
        }
    }
}

/// A fill recorded in the trade history. Append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    /// Originating order, if the trade came through the lifecycle manager.
    pub order_id: Option<Uuid>,
    pub account_id: i64,
    pub symbol: String,
    pub instrument: InstrumentClass,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
    /// Set on closing trades once LIFO matching runs.
    pub realized_pnl: Option<Decimal>,
}

impl Trade {
    /// Create a trade record for a fill.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: Option<Uuid>,
        account_id: i64,
        symbol: impl Into<String>,
        instrument: InstrumentClass,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            account_id,
            symbol: symbol.into(),
            instrument,
            side,
            quantity,
            price,
            fee,
            executed_at,
            realized_pnl: None,
        }
    }

    /// Gross notional value of the trade.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// An open lot awaiting a matching close. Most recent lots are consumed
/// first (LIFO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLot {
    pub account_id: i64,
    pub symbol: String,
    pub instrument: InstrumentClass,
    pub quantity: Decimal,
    pub acquisition_price: Decimal,
    pub acquired_at: DateTime<Utc>,
}

/// Net open quantities for one (account, symbol) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub stock: Decimal,
    pub calls: Decimal,
    pub puts: Decimal,
}

impl PositionView {
    pub fn is_flat(&self) -> bool {
        self.stock.is_zero() && self.calls.is_zero() && self.puts.is_zero()
    }

    /// Quantity for one instrument class.
    pub fn quantity(&self, instrument: InstrumentClass) -> Decimal {
        match instrument {
            InstrumentClass::Stock => self.stock,
            InstrumentClass::Call => self.calls,
            InstrumentClass::Put => self.puts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_instrument_class() {
        assert!(!InstrumentClass::Stock.is_option());
        assert!(InstrumentClass::Call.is_option());
        assert!(InstrumentClass::Put.is_option());
    }

    #[test]
    fn test_trade_notional() {
        let trade = Trade::new(
            None,
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            dec!(150.50),
            dec!(0),
            Utc::now(),
        );
        assert_eq!(trade.notional(), dec!(1505.00));
        assert!(trade.realized_pnl.is_none());
    }

    #[test]
    fn test_position_view() {
        let flat = PositionView::default();
        assert!(flat.is_flat());

        let pos = PositionView {
            stock: dec!(10),
            calls: dec!(0),
            puts: dec!(2),
        };
        assert!(!pos.is_flat());
        assert_eq!(pos.quantity(InstrumentClass::Stock), dec!(10));
        assert_eq!(pos.quantity(InstrumentClass::Put), dec!(2));
    }
}
