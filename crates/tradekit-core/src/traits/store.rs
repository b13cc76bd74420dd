//! Record store trait and an in-memory implementation.

use crate::error::StoreError;
use crate::types::{IndicatorSnapshot, OpenLot, Order, PriceBar, PriorityFlag, Trade};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Persistence seam for the engine's archival records.
///
/// Trades, bars and snapshots are append-only; orders and flags are
/// upserted as their state evolves. Open lots are replaced wholesale per
/// (account, symbol) after each LIFO pass.
pub trait RecordStore: Send + Sync {
    fn record_trade(&self, trade: &Trade) -> Result<(), StoreError>;

    fn record_bar(&self, symbol: &str, bar: &PriceBar) -> Result<(), StoreError>;

    fn record_snapshot(&self, snapshot: &IndicatorSnapshot) -> Result<(), StoreError>;

    fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Record a new current flag for a symbol. Superseded flags are
    /// archived, not deleted, so re-scoring history stays auditable.
    fn upsert_flag(&self, flag: &PriorityFlag) -> Result<(), StoreError>;

    /// Trades for an account and symbol, oldest first.
    fn trades(&self, account_id: i64, symbol: &str) -> Result<Vec<Trade>, StoreError>;

    /// Bars within a timestamp range (ms, inclusive), oldest first.
    fn bars(&self, symbol: &str, start: i64, end: i64) -> Result<Vec<PriceBar>, StoreError>;

    fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// All non-terminal orders.
    fn active_orders(&self) -> Result<Vec<Order>, StoreError>;

    fn open_lots(&self, account_id: i64, symbol: &str) -> Result<Vec<OpenLot>, StoreError>;

    fn save_lots(
        &self,
        account_id: i64,
        symbol: &str,
        lots: &[OpenLot],
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryStoreInner {
    trades: Vec<Trade>,
    bars: HashMap<String, Vec<PriceBar>>,
    snapshots: Vec<IndicatorSnapshot>,
    orders: HashMap<Uuid, Order>,
    /// Per symbol, oldest first; the last entry is the current flag.
    flags: HashMap<String, Vec<PriorityFlag>>,
    lots: HashMap<(i64, String), Vec<OpenLot>>,
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every flag ever recorded for a symbol, oldest first.
    pub fn flag_history(&self, symbol: &str) -> Vec<PriorityFlag> {
        self.inner
            .lock()
            .unwrap()
            .flags
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }
}

impl RecordStore for MemoryStore {
    fn record_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.inner.lock().unwrap().trades.push(trade.clone());
        Ok(())
    }

    fn record_bar(&self, symbol: &str, bar: &PriceBar) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .bars
            .entry(symbol.to_string())
            .or_default()
            .push(*bar);
        Ok(())
    }

    fn record_snapshot(&self, snapshot: &IndicatorSnapshot) -> Result<(), StoreError> {
        self.inner.lock().unwrap().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    fn upsert_flag(&self, flag: &PriorityFlag) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .flags
            .entry(flag.symbol.clone())
            .or_default()
            .push(flag.clone());
        Ok(())
    }

    fn trades(&self, account_id: i64, symbol: &str) -> Result<Vec<Trade>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .trades
            .iter()
            .filter(|t| t.account_id == account_id && t.symbol == symbol)
            .cloned()
            .collect())
    }

    fn bars(&self, symbol: &str, start: i64, end: i64) -> Result<Vec<PriceBar>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().unwrap().orders.get(&id).cloned())
    }

    fn active_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.status.is_active())
            .cloned()
            .collect())
    }

    fn open_lots(&self, account_id: i64, symbol: &str) -> Result<Vec<OpenLot>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lots
            .get(&(account_id, symbol.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn save_lots(
        &self,
        account_id: i64,
        symbol: &str,
        lots: &[OpenLot],
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .lots
            .insert((account_id, symbol.to_string()), lots.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstrumentClass, OrderType, Side};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_filtering() {
        let store = MemoryStore::new();
        let t1 = Trade::new(
            None,
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            dec!(150),
            dec!(0),
            Utc::now(),
        );
        let t2 = Trade::new(
            None,
            2,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(5),
            dec!(151),
            dec!(0),
            Utc::now(),
        );
        store.record_trade(&t1).unwrap();
        store.record_trade(&t2).unwrap();

        let trades = store.trades(1, "AAPL").unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, dec!(10));
    }

    #[test]
    fn test_order_upsert_and_active_filter() {
        let store = MemoryStore::new();
        let mut order = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        );
        store.upsert_order(&order).unwrap();
        assert!(store.active_orders().unwrap().is_empty());

        order.status = crate::types::OrderStatus::Submitted;
        store.upsert_order(&order).unwrap();
        assert_eq!(store.active_orders().unwrap().len(), 1);
    }

    #[test]
    fn test_superseded_flags_are_archived() {
        use crate::types::{ConfigLevel, Tier};

        let store = MemoryStore::new();
        let flag = |timestamp, tier| PriorityFlag {
            symbol: "AAPL".to_string(),
            timestamp,
            score: 1.5,
            tier,
            source_level: ConfigLevel::Global,
        };

        store.upsert_flag(&flag(1000, Tier::Normal)).unwrap();
        store.upsert_flag(&flag(2000, Tier::Priority)).unwrap();

        let history = store.flag_history("AAPL");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tier, Tier::Normal);
        assert_eq!(history[1].tier, Tier::Priority);
        assert!(store.flag_history("MSFT").is_empty());
    }

    #[test]
    fn test_lot_replacement() {
        let store = MemoryStore::new();
        let lot = OpenLot {
            account_id: 1,
            symbol: "AAPL".to_string(),
            instrument: InstrumentClass::Stock,
            quantity: dec!(10),
            acquisition_price: dec!(150),
            acquired_at: Utc::now(),
        };
        store.save_lots(1, "AAPL", &[lot.clone()]).unwrap();
        assert_eq!(store.open_lots(1, "AAPL").unwrap().len(), 1);

        store.save_lots(1, "AAPL", &[]).unwrap();
        assert!(store.open_lots(1, "AAPL").unwrap().is_empty());
    }
}
