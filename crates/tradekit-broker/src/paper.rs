//! In-process paper trading gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use tradekit_core::error::BrokerError;
use tradekit_core::traits::{
    BrokerGateway, BrokerPosition, FillReport, OptionContract, OrderAck, OrderUpdate, Quote,
};
use tradekit_core::types::{Order, OrderStatus, OrderType, Side};

struct PaperOrder {
    symbol: String,
    side: Side,
    update: OrderUpdate,
}

/// Simulated gateway that fills market orders instantly at the posted
/// quote. Used for dry runs and integration tests; no network involved.
pub struct PaperGateway {
    quotes: Mutex<HashMap<String, f64>>,
    orders: Mutex<HashMap<String, PaperOrder>>,
    /// Client order id to broker order id, for lookup after a lost ack.
    client_ids: Mutex<HashMap<String, String>>,
    next_id: AtomicU64,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            client_ids: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Post a quote for a symbol. Orders fill at this price.
    pub fn set_quote(&self, symbol: impl Into<String>, price: f64) {
        self.quotes.lock().unwrap().insert(symbol.into(), price);
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerGateway for PaperGateway {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let quotes = self.quotes.lock().unwrap();
        let price = quotes
            .get(symbol)
            .ok_or_else(|| BrokerError::Api(format!("no quote for {symbol}")))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            bid: price - 0.01,
            ask: price + 0.01,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    async fn get_options_chain(&self, _symbol: &str) -> Result<Vec<OptionContract>, BrokerError> {
        Ok(vec![])
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderAck, BrokerError> {
        let price = {
            let quotes = self.quotes.lock().unwrap();
            *quotes
                .get(&order.symbol)
                .ok_or_else(|| BrokerError::Rejected(format!("no market in {}", order.symbol)))?
        };

        let fill_price = match order.order_type {
            OrderType::Market => {
                Decimal::from_f64(price).ok_or_else(|| BrokerError::Api("bad price".into()))?
            }
            OrderType::Limit { price } => price,
        };

        let broker_order_id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.client_ids
            .lock()
            .unwrap()
            .insert(order.id.to_string(), broker_order_id.clone());
        self.orders.lock().unwrap().insert(
            broker_order_id.clone(),
            PaperOrder {
                symbol: order.symbol.clone(),
                side: order.side,
                update: OrderUpdate {
                    status: OrderStatus::Filled,
                    fills: vec![FillReport {
                        quantity: order.quantity,
                        price: fill_price,
                        fee: Decimal::ZERO,
                        executed_at: Utc::now(),
                    }],
                },
            },
        );

        Ok(OrderAck { broker_order_id })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError> {
        let orders = self.orders.lock().unwrap();
        match orders.get(broker_order_id) {
            Some(_) => Err(BrokerError::Rejected("order already filled".to_string())),
            None => Err(BrokerError::OrderNotFound(broker_order_id.to_string())),
        }
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError> {
        let orders = self.orders.lock().unwrap();
        orders
            .get(broker_order_id)
            .map(|o| o.update.clone())
            .ok_or_else(|| BrokerError::OrderNotFound(broker_order_id.to_string()))
    }

    async fn lookup_order(
        &self,
        client_order_id: &str,
    ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError> {
        let broker_order_id = {
            let ids = self.client_ids.lock().unwrap();
            match ids.get(client_order_id) {
                Some(id) => id.clone(),
                None => return Ok(None),
            }
        };
        let orders = self.orders.lock().unwrap();
        Ok(orders.get(&broker_order_id).map(|o| {
            (
                OrderAck {
                    broker_order_id: broker_order_id.clone(),
                },
                o.update.clone(),
            )
        }))
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let orders = self.orders.lock().unwrap();
        let mut net: HashMap<String, (Decimal, Decimal)> = HashMap::new();

        for order in orders.values() {
            for fill in &order.update.fills {
                let entry = net.entry(order.symbol.clone()).or_default();
                match order.side {
                    Side::Buy => {
                        entry.0 += fill.quantity;
                        entry.1 = fill.price;
                    }
                    Side::Sell => entry.0 -= fill.quantity,
                }
            }
        }

        Ok(net
            .into_iter()
            .filter(|(_, (qty, _))| !qty.is_zero())
            .map(|(symbol, (quantity, avg_entry_price))| BrokerPosition {
                symbol,
                quantity,
                avg_entry_price,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tradekit_core::types::InstrumentClass;

    #[tokio::test]
    async fn test_market_order_fills_at_quote() {
        let gateway = PaperGateway::new();
        gateway.set_quote("AAPL", 150.0);

        let order = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        );
        let ack = gateway.submit_order(&order).await.unwrap();
        let update = gateway.order_status(&ack.broker_order_id).await.unwrap();

        assert_eq!(update.status, OrderStatus::Filled);
        assert_eq!(update.fills.len(), 1);
        assert_eq!(update.fills[0].quantity, dec!(10));
        assert_eq!(update.fills[0].price, dec!(150));
    }

    #[tokio::test]
    async fn test_lookup_by_client_order_id() {
        let gateway = PaperGateway::new();
        gateway.set_quote("AAPL", 150.0);

        let order = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        );
        let ack = gateway.submit_order(&order).await.unwrap();

        let (found_ack, update) = gateway
            .lookup_order(&order.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found_ack.broker_order_id, ack.broker_order_id);
        assert_eq!(update.status, OrderStatus::Filled);

        assert!(gateway.lookup_order("never-sent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_quote_rejects() {
        let gateway = PaperGateway::new();
        let order = Order::draft(
            1,
            "ZZZZ",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(1),
            OrderType::Market,
        );
        let err = gateway.submit_order(&order).await.unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_positions_net_out() {
        let gateway = PaperGateway::new();
        gateway.set_quote("AAPL", 150.0);

        let buy = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Buy,
            dec!(10),
            OrderType::Market,
        );
        gateway.submit_order(&buy).await.unwrap();

        let sell = Order::draft(
            1,
            "AAPL",
            InstrumentClass::Stock,
            Side::Sell,
            dec!(4),
            OrderType::Market,
        );
        gateway.submit_order(&sell).await.unwrap();

        let positions = gateway.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, dec!(6));
    }
}
