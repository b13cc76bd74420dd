//! LIFO lot matching.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use tracing::{error, info};

use tradekit_core::error::{EngineError, EngineResult, LedgerError};
use tradekit_core::traits::RecordStore;
use tradekit_core::types::{InstrumentClass, OpenLot, PositionView, Side, Trade};

/// Last-in-first-out trade accounting.
///
/// Buys open lots; sells consume the most recently opened lots first and
/// realize `quantity * (sell_price - acquisition_price)` per consumed
/// slice. A sell that exceeds the open lots is a lot underflow: the
/// (account, symbol) pair halts until an operator reconciles history and
/// clears it.
pub struct LifoLedger {
    store: Arc<dyn RecordStore>,
    halted: Mutex<HashSet<(i64, String)>>,
    /// One lock per (account, symbol) pair so concurrent fills cannot
    /// interleave the load-match-save cycle.
    locks: Mutex<HashMap<(i64, String), Arc<Mutex<()>>>>,
}

impl LifoLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            halted: Mutex::new(HashSet::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn pair_lock(&self, account_id: i64, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry((account_id, symbol.to_string()))
            .or_default()
            .clone()
    }

    /// Whether trading is halted for a pair.
    pub fn is_halted(&self, account_id: i64, symbol: &str) -> bool {
        self.halted
            .lock()
            .unwrap()
            .contains(&(account_id, symbol.to_string()))
    }

    /// Clear a halt after manual reconciliation.
    pub fn clear_halt(&self, account_id: i64, symbol: &str) {
        self.halted
            .lock()
            .unwrap()
            .remove(&(account_id, symbol.to_string()));
        info!(account_id, symbol, "halt cleared");
    }

    /// Apply one fill to the ledger. Mutates the trade in place to carry
    /// realized P&L on closes, records it, and persists the updated lots.
    pub fn apply_trade(&self, trade: &mut Trade) -> EngineResult<()> {
        let lock = self.pair_lock(trade.account_id, &trade.symbol);
        let _guard = lock.lock().unwrap();

        if self.is_halted(trade.account_id, &trade.symbol) {
            return Err(LedgerError::Halted {
                account_id: trade.account_id,
                symbol: trade.symbol.clone(),
            }
            .into());
        }

        let mut lots = self
            .store
            .open_lots(trade.account_id, &trade.symbol)
            .map_err(EngineError::from)?;

        match trade.side {
            Side::Buy => {
                lots.push(OpenLot {
                    account_id: trade.account_id,
                    symbol: trade.symbol.clone(),
                    instrument: trade.instrument,
                    quantity: trade.quantity,
                    acquisition_price: trade.price,
                    acquired_at: trade.executed_at,
                });
            }
            Side::Sell => {
                let realized = self.consume_lots(&mut lots, trade)?;
                trade.realized_pnl = Some(realized);
            }
        }

        self.store.record_trade(trade).map_err(EngineError::from)?;
        self.store
            .save_lots(trade.account_id, &trade.symbol, &lots)
            .map_err(EngineError::from)?;
        Ok(())
    }

    /// Consume lots newest-first for a closing trade, returning realized
    /// P&L. Only lots of the trade's instrument class are eligible.
    fn consume_lots(&self, lots: &mut Vec<OpenLot>, trade: &Trade) -> EngineResult<Decimal> {
        let mut remaining = trade.quantity;
        let mut realized = Decimal::ZERO;

        while remaining > Decimal::ZERO {
            let Some(idx) = lots
                .iter()
                .rposition(|lot| lot.instrument == trade.instrument)
            else {
                self.halted
                    .lock()
                    .unwrap()
                    .insert((trade.account_id, trade.symbol.clone()));
                error!(
                    account_id = trade.account_id,
                    symbol = %trade.symbol,
                    missing = %remaining,
                    "lot underflow, trading halted for pair"
                );
                return Err(LedgerError::LotUnderflow {
                    account_id: trade.account_id,
                    symbol: trade.symbol.clone(),
                    missing: remaining,
                }
                .into());
            };

            let lot = &mut lots[idx];
            let matched = remaining.min(lot.quantity);
            realized += matched * (trade.price - lot.acquisition_price);
            lot.quantity -= matched;
            remaining -= matched;

            if lot.quantity.is_zero() {
                lots.remove(idx);
            }
        }

        Ok(realized)
    }

    /// Net open quantities per instrument class for a pair.
    pub fn position(&self, account_id: i64, symbol: &str) -> EngineResult<PositionView> {
        let lots = self
            .store
            .open_lots(account_id, symbol)
            .map_err(EngineError::from)?;

        let mut view = PositionView::default();
        for lot in &lots {
            match lot.instrument {
                InstrumentClass::Stock => view.stock += lot.quantity,
                InstrumentClass::Call => view.calls += lot.quantity,
                InstrumentClass::Put => view.puts += lot.quantity,
            }
        }
        Ok(view)
    }

    /// Mark-to-market P&L of the open lots at the given price.
    pub fn unrealized_pnl(
        &self,
        account_id: i64,
        symbol: &str,
        current_price: Decimal,
    ) -> EngineResult<Decimal> {
        let lots = self
            .store
            .open_lots(account_id, symbol)
            .map_err(EngineError::from)?;

        Ok(lots
            .iter()
            .map(|lot| lot.quantity * (current_price - lot.acquisition_price))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tradekit_core::traits::MemoryStore;

    fn ledger() -> LifoLedger {
        LifoLedger::new(Arc::new(MemoryStore::new()))
    }

    fn trade(side: Side, qty: Decimal, price: Decimal) -> Trade {
        Trade::new(
            None,
            1,
            "AAPL",
            InstrumentClass::Stock,
            side,
            qty,
            price,
            dec!(0),
            Utc::now(),
        )
    }

    #[test]
    fn test_lifo_consumes_most_recent_lot_first() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(10), dec!(100))).unwrap();
        ledger.apply_trade(&mut trade(Side::Buy, dec!(10), dec!(110))).unwrap();

        // Sell 10 @ 120: matches the 110 lot, not the 100 one
        let mut sell = trade(Side::Sell, dec!(10), dec!(120));
        ledger.apply_trade(&mut sell).unwrap();
        assert_eq!(sell.realized_pnl, Some(dec!(100)));

        // Remaining lot is the oldest
        let pos = ledger.position(1, "AAPL").unwrap();
        assert_eq!(pos.stock, dec!(10));
    }

    #[test]
    fn test_sell_spanning_multiple_lots() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(5), dec!(100))).unwrap();
        ledger.apply_trade(&mut trade(Side::Buy, dec!(5), dec!(110))).unwrap();

        // Sell 8 @ 120: 5 from the 110 lot, 3 from the 100 lot
        let mut sell = trade(Side::Sell, dec!(8), dec!(120));
        ledger.apply_trade(&mut sell).unwrap();
        // 5 * 10 + 3 * 20 = 110
        assert_eq!(sell.realized_pnl, Some(dec!(110)));

        let pos = ledger.position(1, "AAPL").unwrap();
        assert_eq!(pos.stock, dec!(2));
    }

    #[test]
    fn test_partial_lot_consumption_preserves_remainder() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(10), dec!(100))).unwrap();

        let mut sell = trade(Side::Sell, dec!(4), dec!(90));
        ledger.apply_trade(&mut sell).unwrap();
        assert_eq!(sell.realized_pnl, Some(dec!(-40)));

        let pos = ledger.position(1, "AAPL").unwrap();
        assert_eq!(pos.stock, dec!(6));
    }

    #[test]
    fn test_lot_underflow_halts_pair() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(5), dec!(100))).unwrap();

        let err = ledger
            .apply_trade(&mut trade(Side::Sell, dec!(8), dec!(110)))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::LotUnderflow { .. })
        ));
        assert!(ledger.is_halted(1, "AAPL"));

        // Further trades on the pair are refused
        let err = ledger
            .apply_trade(&mut trade(Side::Buy, dec!(1), dec!(100)))
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::Halted { .. })));

        // Other pairs are unaffected
        assert!(!ledger.is_halted(2, "AAPL"));
        assert!(!ledger.is_halted(1, "MSFT"));
    }

    #[test]
    fn test_clear_halt_resumes_trading() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(1), dec!(100))).unwrap();
        let _ = ledger.apply_trade(&mut trade(Side::Sell, dec!(5), dec!(110)));
        assert!(ledger.is_halted(1, "AAPL"));

        ledger.clear_halt(1, "AAPL");
        assert!(!ledger.is_halted(1, "AAPL"));
        assert!(ledger.apply_trade(&mut trade(Side::Buy, dec!(1), dec!(100))).is_ok());
    }

    #[test]
    fn test_instrument_classes_do_not_cross_match() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(10), dec!(100))).unwrap();

        // Selling a call with only stock lots open underflows
        let mut sell_call = Trade::new(
            None,
            1,
            "AAPL",
            InstrumentClass::Call,
            Side::Sell,
            dec!(1),
            dec!(5),
            dec!(0),
            Utc::now(),
        );
        let err = ledger.apply_trade(&mut sell_call).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::LotUnderflow { .. })
        ));
    }

    #[test]
    fn test_concurrent_sells_never_lose_lots() {
        let ledger = Arc::new(ledger());

        // 20 one-share lots; two threads each sell 10 singles
        for _ in 0..20 {
            ledger.apply_trade(&mut trade(Side::Buy, dec!(1), dec!(100))).unwrap();
        }

        std::thread::scope(|scope| {
            for _ in 0..2 {
                let ledger = Arc::clone(&ledger);
                scope.spawn(move || {
                    for _ in 0..10 {
                        ledger
                            .apply_trade(&mut trade(Side::Sell, dec!(1), dec!(110)))
                            .unwrap();
                    }
                });
            }
        });

        // Interleaved load-match-save would resurrect consumed lots
        let pos = ledger.position(1, "AAPL").unwrap();
        assert_eq!(pos.stock, dec!(0));
        assert!(!ledger.is_halted(1, "AAPL"));
    }

    #[test]
    fn test_unrealized_pnl() {
        let ledger = ledger();

        ledger.apply_trade(&mut trade(Side::Buy, dec!(10), dec!(100))).unwrap();
        ledger.apply_trade(&mut trade(Side::Buy, dec!(5), dec!(110))).unwrap();

        // 10 * 20 + 5 * 10 = 250
        let pnl = ledger.unrealized_pnl(1, "AAPL", dec!(120)).unwrap();
        assert_eq!(pnl, dec!(250));
    }
}
