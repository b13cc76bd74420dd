//! Robinhood gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use tradekit_core::error::{BrokerError, DataError};
use tradekit_core::traits::{
    BrokerGateway, BrokerPosition, FillReport, OptionContract, OrderAck, OrderUpdate, PriceFeed,
    Quote,
};
use tradekit_core::types::{Order, OrderStatus, OrderType, PriceBar, Side};

const API_BASE: &str = "https://api.robinhood.com";

/// Robinhood API configuration. Holds a bearer token; never logged.
#[derive(Clone)]
pub struct RobinhoodConfig {
    pub token: String,
    pub account_url: String,
}

impl RobinhoodConfig {
    pub fn new(token: String, account_url: String) -> Self {
        Self { token, account_url }
    }

    /// Load the token from an environment variable.
    pub fn from_env(token_var: &str, account_url: String) -> Result<Self, BrokerError> {
        let token = std::env::var(token_var)
            .map_err(|_| BrokerError::Auth(format!("{token_var} not set")))?;
        Ok(Self::new(token, account_url))
    }
}

impl std::fmt::Debug for RobinhoodConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodConfig")
            .field("account_url", &self.account_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct PlaceOrderRequest {
    account: String,
    symbol: String,
    quantity: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    time_in_force: String,
    trigger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    /// Our order id, so a timed-out submit can be found again.
    ref_id: String,
}

#[derive(Debug, Deserialize)]
struct RhExecution {
    quantity: String,
    price: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct RhOrder {
    id: String,
    state: String,
    fees: Option<String>,
    executions: Vec<RhExecution>,
    ref_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RhOrdersResponse {
    results: Vec<RhOrder>,
}

#[derive(Debug, Deserialize)]
struct RhQuote {
    symbol: String,
    bid_price: String,
    ask_price: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct RhPosition {
    symbol: Option<String>,
    quantity: String,
    average_buy_price: String,
}

#[derive(Debug, Deserialize)]
struct RhPositionsResponse {
    results: Vec<RhPosition>,
}

#[derive(Debug, Deserialize)]
struct RhHistorical {
    begins_at: String,
    open_price: String,
    high_price: String,
    low_price: String,
    close_price: String,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct RhHistoricalsResponse {
    historicals: Vec<RhHistorical>,
}

impl RhHistorical {
    fn to_price_bar(&self) -> Result<PriceBar, DataError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.begins_at)
            .map_err(|e| DataError::Parse(e.to_string()))?
            .timestamp_millis();
        let parse = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|e| DataError::Parse(format!("bad price {raw}: {e}")))
        };
        Ok(PriceBar::new(
            timestamp,
            parse(&self.open_price)?,
            parse(&self.high_price)?,
            parse(&self.low_price)?,
            parse(&self.close_price)?,
            self.volume,
        ))
    }
}

/// Robinhood broker gateway.
pub struct RobinhoodGateway {
    config: RobinhoodConfig,
    client: Client,
}

impl RobinhoodGateway {
    pub fn new(config: RobinhoodConfig) -> Result<Self, BrokerError> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| BrokerError::Auth(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn error_from(resp: reqwest::Response) -> BrokerError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::Auth(body),
            StatusCode::BAD_REQUEST => BrokerError::Malformed(body),
            StatusCode::NOT_FOUND => BrokerError::OrderNotFound(body),
            StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited { retry_after_secs: 1 },
            s if s.is_server_error() => BrokerError::Transient(format!("{status}: {body}")),
            _ => BrokerError::Api(format!("{status}: {body}")),
        }
    }

    fn map_state(state: &str) -> OrderStatus {
        match state {
            "unconfirmed" | "queued" => OrderStatus::Submitted,
            "confirmed" => OrderStatus::Acknowledged,
            "partially_filled" => OrderStatus::PartiallyFilled,
            "filled" => OrderStatus::Filled,
            "cancelled" => OrderStatus::Cancelled,
            "rejected" | "failed" => OrderStatus::Rejected,
            _ => OrderStatus::Submitted,
        }
    }

    fn parse_decimal(raw: &str) -> Result<Decimal, BrokerError> {
        Decimal::from_str(raw).map_err(|e| BrokerError::Api(format!("bad decimal {raw}: {e}")))
    }

    fn to_update(order: RhOrder) -> Result<OrderUpdate, BrokerError> {
        // Fees are reported per order; attribute them to the first fill
        let total_fee = order
            .fees
            .as_deref()
            .map(Self::parse_decimal)
            .transpose()?
            .unwrap_or(Decimal::ZERO);

        let mut fills = Vec::with_capacity(order.executions.len());
        for (i, exec) in order.executions.iter().enumerate() {
            let executed_at = DateTime::parse_from_rfc3339(&exec.timestamp)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            fills.push(FillReport {
                quantity: Self::parse_decimal(&exec.quantity)?,
                price: Self::parse_decimal(&exec.price)?,
                fee: if i == 0 { total_fee } else { Decimal::ZERO },
                executed_at,
            });
        }

        Ok(OrderUpdate {
            status: Self::map_state(&order.state),
            fills,
        })
    }
}

#[async_trait]
impl BrokerGateway for RobinhoodGateway {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let url = format!("{API_BASE}/quotes/{symbol}/");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let quote: RhQuote = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        let timestamp = DateTime::parse_from_rfc3339(&quote.updated_at)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);

        Ok(Quote {
            symbol: quote.symbol,
            bid: quote.bid_price.parse().unwrap_or(0.0),
            ask: quote.ask_price.parse().unwrap_or(0.0),
            timestamp,
        })
    }

    async fn get_options_chain(&self, _symbol: &str) -> Result<Vec<OptionContract>, BrokerError> {
        // Option chain discovery needs the instrument-chain walk; the
        // engine currently routes option orders by underlying symbol only.
        Ok(vec![])
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderAck, BrokerError> {
        let (order_type, price) = match order.order_type {
            OrderType::Market => ("market", None),
            OrderType::Limit { price } => ("limit", Some(price.to_string())),
        };

        let request = PlaceOrderRequest {
            account: self.config.account_url.clone(),
            symbol: order.symbol.clone(),
            quantity: order.quantity.to_string(),
            side: match order.side {
                Side::Buy => "buy".to_string(),
                Side::Sell => "sell".to_string(),
            },
            order_type: order_type.to_string(),
            time_in_force: "gfd".to_string(),
            trigger: "immediate".to_string(),
            price,
            ref_id: order.id.to_string(),
        };

        let url = format!("{API_BASE}/orders/");
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrokerError::Timeout
                } else {
                    BrokerError::Transient(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let created: RhOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        info!(order_id = %order.id, broker_order_id = %created.id, "order submitted");
        Ok(OrderAck {
            broker_order_id: created.id,
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError> {
        let url = format!("{API_BASE}/orders/{broker_order_id}/cancel/");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(())
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError> {
        let url = format!("{API_BASE}/orders/{broker_order_id}/");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let order: RhOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;
        Self::to_update(order)
    }

    async fn lookup_order(
        &self,
        client_order_id: &str,
    ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError> {
        // No lookup-by-ref_id endpoint; scan the recent order list instead
        let url = format!("{API_BASE}/orders/");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let data: RhOrdersResponse = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        for order in data.results {
            if order.ref_id.as_deref() == Some(client_order_id) {
                let ack = OrderAck {
                    broker_order_id: order.id.clone(),
                };
                return Ok(Some((ack, Self::to_update(order)?)));
            }
        }
        Ok(None)
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let url = format!("{API_BASE}/positions/?nonzero=true");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let data: RhPositionsResponse = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        data.results
            .into_iter()
            .filter_map(|p| p.symbol.clone().map(|s| (s, p)))
            .map(|(symbol, p)| {
                Ok(BrokerPosition {
                    symbol,
                    quantity: Self::parse_decimal(&p.quantity)?,
                    avg_entry_price: Self::parse_decimal(&p.average_buy_price)?,
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        "robinhood"
    }
}

#[async_trait]
impl PriceFeed for RobinhoodGateway {
    async fn price_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = format!("{API_BASE}/marketdata/historicals/{symbol}/");
        let resp = self
            .client
            .get(&url)
            .query(&[("interval", "day"), ("span", "year")])
            .send()
            .await
            .map_err(|e| DataError::Connection(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DataError::Connection(format!("{status}: {body}")));
        }

        let data: RhHistoricalsResponse = resp
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();
        let mut bars = Vec::with_capacity(data.historicals.len());
        for raw in &data.historicals {
            let bar = raw.to_price_bar()?;
            if bar.timestamp >= start_ms && bar.timestamp <= end_ms {
                bars.push(bar);
            }
        }
        if bars.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(bars)
    }

    async fn latest_bar(&self, symbol: &str) -> Result<Option<PriceBar>, DataError> {
        let end = Utc::now();
        let start = end - chrono::Duration::days(7);
        match self.price_history(symbol, start, end).await {
            Ok(bars) => Ok(bars.into_iter().last()),
            Err(DataError::NoDataAvailable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "robinhood"
    }
}
