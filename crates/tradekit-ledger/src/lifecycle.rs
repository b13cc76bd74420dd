//! Order lifecycle management.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use tradekit_core::error::{BrokerError, EngineError, EngineResult, OrderError};
use tradekit_core::traits::{BrokerGateway, RecordStore};
use tradekit_core::types::{Order, OrderStatus, Trade};

/// Legal order status transitions.
fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    use OrderStatus::*;
    let ok = matches!(
        (from, to),
        (Drafted, Submitted)
            | (Drafted, Cancelled)
            | (Submitted, Acknowledged)
            | (Submitted, PartiallyFilled)
            | (Submitted, Filled)
            | (Submitted, Cancelled)
            | (Submitted, Rejected)
            | (Acknowledged, PartiallyFilled)
            | (Acknowledged, Filled)
            | (Acknowledged, Cancelled)
            | (Acknowledged, Rejected)
            | (PartiallyFilled, PartiallyFilled)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
    );
    if ok {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Drives orders through their state machine against a broker gateway,
/// persisting every status change.
pub struct OrderManager {
    gateway: Arc<dyn BrokerGateway>,
    store: Arc<dyn RecordStore>,
}

impl OrderManager {
    pub fn new(gateway: Arc<dyn BrokerGateway>, store: Arc<dyn RecordStore>) -> Self {
        Self { gateway, store }
    }

    fn set_status(&self, order: &mut Order, to: OrderStatus) -> EngineResult<()> {
        validate_transition(order.status, to).map_err(EngineError::from)?;
        order.status = to;
        self.store.upsert_order(order).map_err(EngineError::from)?;
        Ok(())
    }

    /// Submit a drafted order.
    ///
    /// The order is persisted as Submitted before the call goes out so a
    /// crash mid-flight leaves it discoverable for reconciliation. A
    /// timeout keeps it Submitted for the same reason; a definite broker
    /// rejection marks it Rejected.
    pub async fn submit(&self, order: &mut Order) -> EngineResult<()> {
        if order.status != OrderStatus::Drafted {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Submitted.to_string(),
            }
            .into());
        }

        self.set_status(order, OrderStatus::Submitted)?;

        match self.gateway.submit_order(order).await {
            Ok(ack) => {
                order.broker_order_id = Some(ack.broker_order_id);
                self.set_status(order, OrderStatus::Acknowledged)?;
                info!(order_id = %order.id, broker = self.gateway.name(), "order acknowledged");
                Ok(())
            }
            Err(BrokerError::Timeout) => {
                // Unknown outcome: the broker may hold the order. Leave it
                // Submitted for the reconciliation pass.
                warn!(order_id = %order.id, "submission timed out, pending reconciliation");
                Err(EngineError::Broker(BrokerError::Timeout))
            }
            Err(err @ (BrokerError::Rejected(_) | BrokerError::Auth(_) | BrokerError::Malformed(_))) => {
                self.set_status(order, OrderStatus::Rejected)?;
                Err(EngineError::Broker(err))
            }
            Err(err) => {
                // The request never reached the broker; back to the draft
                // state so it can be resubmitted.
                order.status = OrderStatus::Drafted;
                self.store.upsert_order(order).map_err(EngineError::from)?;
                Err(EngineError::Broker(err))
            }
        }
    }

    /// Cancel a working order. Orders with any fills cannot be cancelled.
    pub async fn cancel(&self, order: &mut Order) -> EngineResult<()> {
        if order.has_fills() {
            return Err(OrderError::AlreadyFilled(order.id).into());
        }
        if !order.status.is_active() && order.status != OrderStatus::Drafted {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            }
            .into());
        }

        if let Some(broker_order_id) = &order.broker_order_id {
            self.gateway
                .cancel_order(broker_order_id)
                .await
                .map_err(EngineError::from)?;
        }

        self.set_status(order, OrderStatus::Cancelled)?;
        info!(order_id = %order.id, "order cancelled");
        Ok(())
    }

    /// Reconcile an order against the broker's view, returning trade
    /// records for any fills not yet applied.
    ///
    /// Fill reports are replayed beyond the quantity already accounted
    /// for, so repeated reconciliation of the same order is idempotent.
    pub async fn reconcile(&self, order: &mut Order) -> EngineResult<Vec<Trade>> {
        let update = match order.broker_order_id.clone() {
            Some(broker_order_id) => self
                .gateway
                .order_status(&broker_order_id)
                .await
                .map_err(EngineError::from)?,
            // A Submitted order with no broker id is a timed-out submit.
            // Look it up by our order id, which went out with the request.
            None if order.status == OrderStatus::Submitted => {
                match self
                    .gateway
                    .lookup_order(&order.id.to_string())
                    .await
                    .map_err(EngineError::from)?
                {
                    Some((ack, update)) => {
                        order.broker_order_id = Some(ack.broker_order_id);
                        update
                    }
                    None => {
                        // The broker never received it; close it out
                        warn!(order_id = %order.id, "timed-out order unknown to broker, cancelling");
                        self.set_status(order, OrderStatus::Cancelled)?;
                        return Ok(vec![]);
                    }
                }
            }
            None => return Ok(vec![]),
        };

        let mut new_trades = Vec::new();
        let mut replayed = Decimal::ZERO;
        for fill in &update.fills {
            let fill_end = replayed + fill.quantity;
            if fill_end > order.filled_quantity {
                let new_qty = fill_end - order.filled_quantity.max(replayed);
                new_trades.push(Trade::new(
                    Some(order.id),
                    order.account_id,
                    &order.symbol,
                    order.instrument,
                    order.side,
                    new_qty,
                    fill.price,
                    fill.fee,
                    fill.executed_at,
                ));
            }
            replayed = fill_end;
        }

        if replayed > order.filled_quantity {
            order.filled_quantity = replayed;
        }

        if update.status != order.status {
            self.set_status(order, update.status)?;
            info!(
                order_id = %order.id,
                status = %order.status,
                fills = new_trades.len(),
                "order reconciled"
            );
        } else {
            self.store.upsert_order(order).map_err(EngineError::from)?;
        }

        Ok(new_trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use tradekit_core::traits::{
        BrokerPosition, FillReport, MemoryStore, OptionContract, OrderAck, OrderUpdate, Quote,
    };
    use tradekit_core::types::{InstrumentClass, OrderType, Side};

    /// Gateway with scripted submit and status responses.
    struct ScriptedGateway {
        submit_result: Mutex<Option<Result<OrderAck, BrokerError>>>,
        status_result: Mutex<Option<OrderUpdate>>,
        lookup_result: Mutex<Option<(OrderAck, OrderUpdate)>>,
    }

    impl ScriptedGateway {
        fn submitting(result: Result<OrderAck, BrokerError>) -> Self {
            Self {
                submit_result: Mutex::new(Some(result)),
                status_result: Mutex::new(None),
                lookup_result: Mutex::new(None),
            }
        }

        fn with_status(self, update: OrderUpdate) -> Self {
            *self.status_result.lock().unwrap() = Some(update);
            self
        }

        fn with_lookup(self, ack: OrderAck, update: OrderUpdate) -> Self {
            *self.lookup_result.lock().unwrap() = Some((ack, update));
            self
        }
    }

    #[async_trait]
    impl BrokerGateway for ScriptedGateway {
        async fn get_quote(&self, _symbol: &str) -> Result<Quote, BrokerError> {
            unimplemented!()
        }

        async fn get_options_chain(
            &self,
            _symbol: &str,
        ) -> Result<Vec<OptionContract>, BrokerError> {
            unimplemented!()
        }

        async fn submit_order(&self, _order: &Order) -> Result<OrderAck, BrokerError> {
            self.submit_result.lock().unwrap().take().unwrap()
        }

        async fn cancel_order(&self, _broker_order_id: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn order_status(&self, _broker_order_id: &str) -> Result<OrderUpdate, BrokerError> {
            Ok(self.status_result.lock().unwrap().clone().unwrap())
        }

        async fn lookup_order(
            &self,
            _client_order_id: &str,
        ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError> {
            Ok(self.lookup_result.lock().unwrap().clone())
        }

        async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn draft() -> Order {
        Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        )
    }

    #[tokio::test]
    async fn test_submit_acknowledged() {
        let gateway = Arc::new(ScriptedGateway::submitting(Ok(OrderAck {
            broker_order_id: "b-1".to_string(),
        })));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store.clone());

        let mut order = draft();
        manager.submit(&mut order).await.unwrap();

        assert_eq!(order.status, OrderStatus::Acknowledged);
        assert_eq!(order.broker_order_id.as_deref(), Some("b-1"));
        let persisted = store.get_order(order.id).unwrap().unwrap();
        assert_eq!(persisted.status, OrderStatus::Acknowledged);
    }

    #[tokio::test]
    async fn test_submit_timeout_stays_submitted() {
        let gateway = Arc::new(ScriptedGateway::submitting(Err(BrokerError::Timeout)));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store.clone());

        let mut order = draft();
        let err = manager.submit(&mut order).await.unwrap_err();

        assert!(matches!(err, EngineError::Broker(BrokerError::Timeout)));
        assert_eq!(order.status, OrderStatus::Submitted);
        // Persisted as Submitted so reconciliation can find it
        let persisted = store.get_order(order.id).unwrap().unwrap();
        assert_eq!(persisted.status, OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_terminal() {
        let gateway = Arc::new(ScriptedGateway::submitting(Err(BrokerError::Rejected(
            "insufficient buying power".to_string(),
        ))));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store);

        let mut order = draft();
        assert!(manager.submit(&mut order).await.is_err());
        assert_eq!(order.status, OrderStatus::Rejected);
    }

    #[tokio::test]
    async fn test_submit_unavailable_reverts_to_draft() {
        let gateway = Arc::new(ScriptedGateway::submitting(Err(
            BrokerError::Unavailable { cooldown_secs: 30 },
        )));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store);

        let mut order = draft();
        assert!(manager.submit(&mut order).await.is_err());
        assert_eq!(order.status, OrderStatus::Drafted);
    }

    #[tokio::test]
    async fn test_cancel_with_fills_refused() {
        let gateway = Arc::new(ScriptedGateway::submitting(Ok(OrderAck {
            broker_order_id: "b-1".to_string(),
        })));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store);

        let mut order = draft();
        manager.submit(&mut order).await.unwrap();
        order.status = OrderStatus::PartiallyFilled;
        order.filled_quantity = dec!(3);

        let err = manager.cancel(&mut order).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Order(OrderError::AlreadyFilled(_))
        ));
        // Status untouched
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
    }

    #[tokio::test]
    async fn test_cancel_unfilled_order() {
        let gateway = Arc::new(ScriptedGateway::submitting(Ok(OrderAck {
            broker_order_id: "b-1".to_string(),
        })));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store);

        let mut order = draft();
        manager.submit(&mut order).await.unwrap();
        manager.cancel(&mut order).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reconcile_applies_fills_idempotently() {
        let fills = vec![
            FillReport {
                quantity: dec!(4),
                price: dec!(100),
                fee: dec!(0),
                executed_at: Utc::now(),
            },
            FillReport {
                quantity: dec!(6),
                price: dec!(101),
                fee: dec!(0),
                executed_at: Utc::now(),
            },
        ];
        let gateway = Arc::new(
            ScriptedGateway::submitting(Ok(OrderAck {
                broker_order_id: "b-1".to_string(),
            }))
            .with_status(OrderUpdate {
                status: OrderStatus::Filled,
                fills,
            }),
        );
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store);

        let mut order = draft();
        manager.submit(&mut order).await.unwrap();

        let trades = manager.reconcile(&mut order).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(order.filled_quantity, dec!(10));
        assert_eq!(order.status, OrderStatus::Filled);

        // Replaying the same broker state produces no duplicate trades
        let trades = manager.reconcile(&mut order).await.unwrap();
        assert!(trades.is_empty());
        assert_eq!(order.filled_quantity, dec!(10));
    }

    #[tokio::test]
    async fn test_reconcile_partial_then_remainder() {
        let first = FillReport {
            quantity: dec!(4),
            price: dec!(100),
            fee: dec!(0),
            executed_at: Utc::now(),
        };
        let gateway = Arc::new(
            ScriptedGateway::submitting(Ok(OrderAck {
                broker_order_id: "b-1".to_string(),
            }))
            .with_status(OrderUpdate {
                status: OrderStatus::PartiallyFilled,
                fills: vec![first.clone()],
            }),
        );
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway.clone(), store);

        let mut order = draft();
        manager.submit(&mut order).await.unwrap();

        let trades = manager.reconcile(&mut order).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(order.filled_quantity, dec!(4));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        // Broker later reports the remainder
        *gateway.status_result.lock().unwrap() = Some(OrderUpdate {
            status: OrderStatus::Filled,
            fills: vec![
                first,
                FillReport {
                    quantity: dec!(6),
                    price: dec!(102),
                    fee: dec!(0),
                    executed_at: Utc::now(),
                },
            ],
        });
        let trades = manager.reconcile(&mut order).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, dec!(6));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_reconcile_recovers_timed_out_submit() {
        // The submit times out, so no broker id is ever recorded
        let gateway = Arc::new(
            ScriptedGateway::submitting(Err(BrokerError::Timeout)).with_lookup(
                OrderAck {
                    broker_order_id: "b-9".to_string(),
                },
                OrderUpdate {
                    status: OrderStatus::Filled,
                    fills: vec![FillReport {
                        quantity: dec!(10),
                        price: dec!(100),
                        fee: dec!(0),
                        executed_at: Utc::now(),
                    }],
                },
            ),
        );
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store.clone());

        let mut order = draft();
        assert!(manager.submit(&mut order).await.is_err());
        assert_eq!(order.status, OrderStatus::Submitted);
        assert!(order.broker_order_id.is_none());

        // The broker did take the order; reconciliation finds it by our id
        let trades = manager.reconcile(&mut order).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(order.broker_order_id.as_deref(), Some("b-9"));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, dec!(10));
    }

    #[tokio::test]
    async fn test_reconcile_cancels_lost_submit() {
        // Timeout on submit and the broker has no record of the order
        let gateway = Arc::new(ScriptedGateway::submitting(Err(BrokerError::Timeout)));
        let store = Arc::new(MemoryStore::new());
        let manager = OrderManager::new(gateway, store.clone());

        let mut order = draft();
        assert!(manager.submit(&mut order).await.is_err());

        let trades = manager.reconcile(&mut order).await.unwrap();
        assert!(trades.is_empty());
        assert_eq!(order.status, OrderStatus::Cancelled);
        let persisted = store.get_order(order.id).unwrap().unwrap();
        assert_eq!(persisted.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(validate_transition(Drafted, Submitted).is_ok());
        assert!(validate_transition(Submitted, Acknowledged).is_ok());
        assert!(validate_transition(Acknowledged, Filled).is_ok());
        assert!(validate_transition(PartiallyFilled, Filled).is_ok());

        assert!(validate_transition(Filled, Cancelled).is_err());
        assert!(validate_transition(Cancelled, Submitted).is_err());
        assert!(validate_transition(Rejected, Acknowledged).is_err());
        assert!(validate_transition(Drafted, Filled).is_err());
    }
}
