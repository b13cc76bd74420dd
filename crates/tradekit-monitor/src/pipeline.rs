//! Per-instrument decision pipeline.
//!
//! One pass: fetch history, compute the snapshot, re-score the
//! monitoring tier, run the strategy against the current position, size
//! surviving intents, and drive the resulting orders through submission
//! and reconciliation into the ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use tradekit_config::LayeredConfig;
use tradekit_core::error::{EngineError, EngineResult};
use tradekit_core::traits::{BrokerGateway, PriceFeed, RecordStore};
use tradekit_core::types::{
    IntentPurpose, Order, OrderType, PriceSeries, RiskProfile, Side, Tier, TradeIntent,
};
use tradekit_indicators::SnapshotBuilder;
use tradekit_ledger::{LifoLedger, OrderManager};
use tradekit_risk::PositionSizer;
use tradekit_strategy::{MomentumStrategy, PriorityScorer, StrategyContext};

/// Days of daily bars fetched for indicator warmup.
const HISTORY_DAYS: i64 = 120;

/// One account's inputs to a pipeline pass.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub profile: RiskProfile,
    pub options_enabled: bool,
}

/// Result of one instrument pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub tier: Tier,
    pub intents: usize,
    pub orders_placed: usize,
}

/// The decision pipeline. Shared across scheduler tasks.
pub struct Pipeline {
    feed: Arc<dyn PriceFeed>,
    gateway: Arc<dyn BrokerGateway>,
    store: Arc<dyn RecordStore>,
    ledger: Arc<LifoLedger>,
    orders: OrderManager,
    builder: SnapshotBuilder,
    scorer: PriorityScorer,
    strategy: MomentumStrategy,
    sizer: PositionSizer,
    config: Arc<LayeredConfig>,
    /// Day trades consumed per account in the current UTC session.
    day_trades: Mutex<HashMap<(i64, NaiveDate), u32>>,
}

impl Pipeline {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn RecordStore>,
        ledger: Arc<LifoLedger>,
        config: Arc<LayeredConfig>,
        builder: SnapshotBuilder,
    ) -> Self {
        let orders = OrderManager::new(gateway.clone(), store.clone());
        Self {
            feed,
            gateway,
            store,
            ledger,
            orders,
            builder,
            scorer: PriorityScorer::new(),
            strategy: MomentumStrategy::new(),
            sizer: PositionSizer::new(),
            config,
            day_trades: Mutex::new(HashMap::new()),
        }
    }

    /// Run one full pass for an instrument and account.
    pub async fn run_instrument(
        &self,
        symbol: &str,
        account: &AccountContext,
    ) -> EngineResult<PipelineOutcome> {
        let account_id = account.profile.account_id;
        if self.ledger.is_halted(account_id, symbol) {
            warn!(account_id, symbol, "pair halted, skipping pass");
            return Ok(PipelineOutcome {
                tier: Tier::Normal,
                intents: 0,
                orders_placed: 0,
            });
        }

        let series = self.fetch_series(symbol).await?;
        let Some(snapshot) = self.builder.build(&series) else {
            warn!(symbol, "no bars available, skipping pass");
            return Ok(PipelineOutcome {
                tier: Tier::Normal,
                intents: 0,
                orders_placed: 0,
            });
        };
        self.store
            .record_snapshot(&snapshot)
            .map_err(EngineError::from)?;

        let flag = self
            .scorer
            .evaluate(&snapshot, &self.config)
            .map_err(EngineError::from)?;
        self.store.upsert_flag(&flag).map_err(EngineError::from)?;

        let position = self.ledger.position(account_id, symbol)?;
        let ctx = StrategyContext {
            position,
            options_enabled: account.options_enabled,
        };
        let intents = self
            .strategy
            .evaluate(&snapshot, &ctx, &self.config)
            .map_err(EngineError::from)?;

        let mut orders_placed = 0;
        for intent in &intents {
            match self.execute_intent(intent, account).await {
                Ok(true) => orders_placed += 1,
                Ok(false) => {}
                // Sizing rejections drop the intent without failing the pass
                Err(EngineError::Sizing(err)) => {
                    info!(symbol, error = %err, "intent dropped by sizing");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(PipelineOutcome {
            tier: flag.tier,
            intents: intents.len(),
            orders_placed,
        })
    }

    /// Close every open lot for an instrument with market orders,
    /// bypassing the strategy.
    pub async fn flatten(&self, symbol: &str, account: &AccountContext) -> EngineResult<usize> {
        let account_id = account.profile.account_id;
        let position = self.ledger.position(account_id, symbol)?;
        if position.is_flat() {
            return Ok(0);
        }

        let mut closed = 0;
        for instrument in [
            tradekit_core::types::InstrumentClass::Stock,
            tradekit_core::types::InstrumentClass::Call,
            tradekit_core::types::InstrumentClass::Put,
        ] {
            let quantity = position.quantity(instrument);
            if quantity <= Decimal::ZERO {
                continue;
            }
            let mut order = Order::draft(
                account_id,
                symbol,
                instrument,
                Side::Sell,
                quantity,
                OrderType::Market,
            );
            self.orders.submit(&mut order).await?;
            self.settle(&mut order).await?;
            closed += 1;
        }
        info!(account_id, symbol, closed, "position flattened");
        Ok(closed)
    }

    async fn fetch_series(&self, symbol: &str) -> EngineResult<PriceSeries> {
        let end = Utc::now();
        let start = end - Duration::days(HISTORY_DAYS);
        let bars = self
            .feed
            .price_history(symbol, start, end)
            .await
            .map_err(EngineError::from)?;

        let mut series = PriceSeries::new(symbol);
        series.extend(bars);
        if let Some(last) = series.last() {
            self.store
                .record_bar(symbol, last)
                .map_err(EngineError::from)?;
        }
        Ok(series)
    }

    /// Size, submit and settle one intent. Returns whether an order was
    /// placed.
    ///
    /// An exit against a position opened in the current UTC session is a
    /// day trade: it must clear the account's remaining allowance and
    /// consumes one unit of it once the close goes through.
    async fn execute_intent(
        &self,
        intent: &TradeIntent,
        account: &AccountContext,
    ) -> EngineResult<bool> {
        let account_id = account.profile.account_id;
        let mut day_trade = false;
        let quantity = match intent.purpose {
            IntentPurpose::Exit => {
                let position = self.ledger.position(account_id, &intent.symbol)?;
                let quantity = position.quantity(intent.instrument);
                if quantity > Decimal::ZERO && self.opened_today(account_id, &intent.symbol)? {
                    self.sizer
                        .check_day_trade(&account.profile, self.day_trades_used(account_id))
                        .map_err(EngineError::from)?;
                    day_trade = true;
                }
                quantity
            }
            IntentPurpose::Enter => {
                let quote = self
                    .gateway
                    .get_quote(&intent.symbol)
                    .await
                    .map_err(EngineError::from)?;
                let price = Decimal::from_f64(quote.mid()).ok_or_else(|| {
                    EngineError::Internal(format!("bad quote for {}", intent.symbol))
                })?;
                self.sizer
                    .size_entry(&account.profile, price)
                    .map_err(EngineError::from)?
            }
        };

        if quantity <= Decimal::ZERO {
            return Ok(false);
        }

        let mut order = Order::draft(
            account_id,
            &intent.symbol,
            intent.instrument,
            intent.side,
            quantity,
            OrderType::Market,
        );
        self.orders.submit(&mut order).await?;
        self.settle(&mut order).await?;
        if day_trade {
            self.consume_day_trade(account_id);
        }
        Ok(true)
    }

    /// Pull fills for an order and post them to the ledger.
    async fn settle(&self, order: &mut Order) -> EngineResult<()> {
        let trades = self.orders.reconcile(order).await?;
        for mut trade in trades {
            self.ledger.apply_trade(&mut trade)?;
        }
        Ok(())
    }

    /// Whether the pair holds a position opened in the current UTC
    /// session, so closing it now would complete a day trade.
    fn opened_today(&self, account_id: i64, symbol: &str) -> EngineResult<bool> {
        let today = Utc::now().date_naive();
        let trades = self
            .store
            .trades(account_id, symbol)
            .map_err(EngineError::from)?;
        Ok(trades
            .iter()
            .any(|t| t.side == Side::Buy && t.executed_at.date_naive() == today))
    }

    fn day_trades_used(&self, account_id: i64) -> u32 {
        let today = Utc::now().date_naive();
        *self
            .day_trades
            .lock()
            .unwrap()
            .get(&(account_id, today))
            .unwrap_or(&0)
    }

    fn consume_day_trade(&self, account_id: i64) {
        let today = Utc::now().date_naive();
        let mut used = self.day_trades.lock().unwrap();
        // Entries for past sessions are dead weight; drop them here
        used.retain(|(_, date), _| *date == today);
        *used.entry((account_id, today)).or_insert(0) += 1;
    }

    /// Reconcile all persisted non-terminal orders against the broker.
    /// Run at startup to resolve orders left Submitted by a crash or
    /// timeout.
    pub async fn reconcile_active_orders(&self) -> EngineResult<usize> {
        let active = self.store.active_orders().map_err(EngineError::from)?;
        let count = active.len();
        for mut order in active {
            match self.orders.reconcile(&mut order).await {
                Ok(trades) => {
                    for mut trade in trades {
                        self.ledger.apply_trade(&mut trade)?;
                    }
                }
                Err(err) => warn!(order_id = %order.id, error = %err, "reconciliation failed"),
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tradekit_broker::PaperGateway;
    use tradekit_core::error::DataError;
    use tradekit_core::traits::MemoryStore;
    use tradekit_core::types::PriceBar;

    /// Feed serving a synthetic strong uptrend.
    struct TrendingFeed;

    #[async_trait]
    impl PriceFeed for TrendingFeed {
        async fn price_history(
            &self,
            _symbol: &str,
            _start: chrono::DateTime<Utc>,
            _end: chrono::DateTime<Utc>,
        ) -> Result<Vec<PriceBar>, DataError> {
            Ok((0..80)
                .map(|i| {
                    let base = 100.0 + i as f64;
                    PriceBar::new(i * 86_400_000, base, base + 3.0, base - 1.0, base + 2.0, 1e6)
                })
                .collect())
        }

        async fn latest_bar(&self, _symbol: &str) -> Result<Option<PriceBar>, DataError> {
            Ok(None)
        }

        fn name(&self) -> &str {
            "trending"
        }
    }

    fn account(balance: Decimal) -> AccountContext {
        account_with_day_trades(balance, 3)
    }

    fn account_with_day_trades(balance: Decimal, day_trades_remaining: u32) -> AccountContext {
        AccountContext {
            profile: RiskProfile {
                account_id: 1,
                balance,
                risk_fraction: dec!(0.02),
                min_balance_floor: dec!(0),
                day_trades_remaining,
            },
            options_enabled: false,
        }
    }

    fn pipeline(gateway: Arc<PaperGateway>, store: Arc<MemoryStore>) -> Pipeline {
        let ledger = Arc::new(LifoLedger::new(store.clone()));
        Pipeline::new(
            Arc::new(TrendingFeed),
            gateway,
            store,
            ledger,
            Arc::new(LayeredConfig::new()),
            SnapshotBuilder::default(),
        )
    }

    #[tokio::test]
    async fn test_uptrend_pass_opens_position() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store.clone());

        let outcome = pipeline
            .run_instrument("AAPL", &account(dec!(100000)))
            .await
            .unwrap();

        assert_eq!(outcome.intents, 1);
        assert_eq!(outcome.orders_placed, 1);
        // The fill landed in the ledger
        let trades = store.trades(1, "AAPL").unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, Side::Buy);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store.clone());
        let acct = account(dec!(100000));

        pipeline.run_instrument("AAPL", &acct).await.unwrap();
        let second = pipeline.run_instrument("AAPL", &acct).await.unwrap();

        assert_eq!(second.orders_placed, 0);
        assert_eq!(store.trades(1, "AAPL").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sizing_rejection_drops_intent_quietly() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store.clone());

        // 2% of 1000 = 20: cannot afford one share at 180
        let outcome = pipeline
            .run_instrument("AAPL", &account(dec!(1000)))
            .await
            .unwrap();

        assert_eq!(outcome.intents, 1);
        assert_eq!(outcome.orders_placed, 0);
        assert!(store.trades(1, "AAPL").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_of_same_session_entry_blocked_when_allowance_exhausted() {
        use tradekit_core::error::SizingError;
        use tradekit_core::types::{InstrumentClass, Trade};

        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store);
        let acct = account_with_day_trades(dec!(100000), 0);

        // Position opened earlier in the same session
        let mut buy = Trade::new(
            None,
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(11),
            dec!(175),
            dec!(0),
            Utc::now(),
        );
        pipeline.ledger.apply_trade(&mut buy).unwrap();

        // Closing it now would be a day trade and the allowance is spent
        let exit = TradeIntent::new(
            "AAPL",
            Side::Sell,
            InstrumentClass::Stock,
            IntentPurpose::Exit,
            0.9,
        );
        let err = pipeline.execute_intent(&exit, &acct).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Sizing(SizingError::DayTradeLimitExceeded { .. })
        ));
        // Position untouched
        let position = pipeline.ledger.position(1, "AAPL").unwrap();
        assert_eq!(position.stock, dec!(11));
    }

    #[tokio::test]
    async fn test_round_trip_consumes_day_trade_allowance() {
        use tradekit_core::error::SizingError;
        use tradekit_core::types::{InstrumentClass, Trade};

        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store);
        let acct = account_with_day_trades(dec!(100000), 1);

        let buy_today = || {
            Trade::new(
                None,
                1,
                "AAPL",
                InstrumentClass::Stock,
                Side::Buy,
                dec!(5),
                dec!(175),
                dec!(0),
                Utc::now(),
            )
        };
        let exit = TradeIntent::new(
            "AAPL",
            Side::Sell,
            InstrumentClass::Stock,
            IntentPurpose::Exit,
            0.9,
        );

        // First same-session round trip fits the allowance
        pipeline.ledger.apply_trade(&mut buy_today()).unwrap();
        assert!(pipeline.execute_intent(&exit, &acct).await.unwrap());
        assert!(pipeline.ledger.position(1, "AAPL").unwrap().is_flat());

        // The close consumed it; a second round trip is refused
        pipeline.ledger.apply_trade(&mut buy_today()).unwrap();
        let err = pipeline.execute_intent(&exit, &acct).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Sizing(SizingError::DayTradeLimitExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_flatten_closes_position() {
        let gateway = Arc::new(PaperGateway::new());
        gateway.set_quote("AAPL", 180.0);
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(gateway, store.clone());
        let acct = account(dec!(100000));

        pipeline.run_instrument("AAPL", &acct).await.unwrap();
        let closed = pipeline.flatten("AAPL", &acct).await.unwrap();

        assert_eq!(closed, 1);
        let position = pipeline.ledger.position(1, "AAPL").unwrap();
        assert!(position.is_flat());

        // Nothing left to close
        assert_eq!(pipeline.flatten("AAPL", &acct).await.unwrap(), 0);
    }
}
