//! Alpaca gateway for paper and live trading.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use tradekit_core::error::{BrokerError, DataError};
use tradekit_core::traits::{
    BrokerGateway, BrokerPosition, FillReport, OptionContract, OrderAck, OrderUpdate, PriceFeed,
    Quote,
};
use tradekit_core::types::{InstrumentClass, Order, OrderStatus, OrderType, PriceBar, Side};

/// Alpaca API configuration. Credentials come from the environment and
/// are never logged.
#[derive(Clone)]
pub struct AlpacaConfig {
    pub api_key: String,
    pub api_secret: String,
    pub paper: bool,
}

impl AlpacaConfig {
    pub fn new(api_key: String, api_secret: String, paper: bool) -> Self {
        Self {
            api_key,
            api_secret,
            paper,
        }
    }

    /// Load from environment variables.
    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, BrokerError> {
        let api_key = std::env::var(key_var)
            .map_err(|_| BrokerError::Auth(format!("{key_var} not set")))?;
        let api_secret = std::env::var(secret_var)
            .map_err(|_| BrokerError::Auth(format!("{secret_var} not set")))?;
        Ok(Self::new(api_key, api_secret, true))
    }

    pub fn base_url(&self) -> &str {
        if self.paper {
            "https://paper-api.alpaca.markets"
        } else {
            "https://api.alpaca.markets"
        }
    }

    pub fn data_url(&self) -> &str {
        "https://data.alpaca.markets"
    }
}

impl std::fmt::Debug for AlpacaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaConfig")
            .field("paper", &self.paper)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    symbol: String,
    qty: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    time_in_force: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
    /// Our order id, so a timed-out submit can be found again.
    client_order_id: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id: String,
    status: String,
    filled_qty: String,
    filled_avg_price: Option<String>,
    filled_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaPosition {
    symbol: String,
    qty: String,
    avg_entry_price: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaLatestQuote {
    ap: f64,
    bp: f64,
    t: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaQuoteResponse {
    quote: AlpacaLatestQuote,
}

#[derive(Debug, Deserialize)]
struct AlpacaOptionContract {
    underlying_symbol: String,
    #[serde(rename = "type")]
    contract_type: String,
    strike_price: String,
    expiration_date: String,
    close_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlpacaContractsResponse {
    option_contracts: Vec<AlpacaOptionContract>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct AlpacaBarsResponse {
    bars: Option<Vec<AlpacaBar>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaLatestBarResponse {
    bar: Option<AlpacaBar>,
}

impl AlpacaBar {
    fn to_price_bar(&self) -> Result<PriceBar, DataError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.t)
            .map_err(|e| DataError::Parse(e.to_string()))?
            .timestamp_millis();
        Ok(PriceBar::new(
            timestamp, self.o, self.h, self.l, self.c, self.v,
        ))
    }
}

/// Alpaca broker gateway.
pub struct AlpacaGateway {
    config: AlpacaConfig,
    client: Client,
}

impl AlpacaGateway {
    /// Create a new Alpaca gateway.
    pub fn new(config: AlpacaConfig) -> Result<Self, BrokerError> {
        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(&config.api_key)
            .map_err(|e| BrokerError::Auth(e.to_string()))?;
        key.set_sensitive(true);
        headers.insert("APCA-API-KEY-ID", key);
        let mut secret = header::HeaderValue::from_str(&config.api_secret)
            .map_err(|e| BrokerError::Auth(e.to_string()))?;
        secret.set_sensitive(true);
        headers.insert("APCA-API-SECRET-KEY", secret);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Map an HTTP error response to a broker error.
    async fn error_from(resp: reqwest::Response) -> BrokerError {
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let body = resp.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::Auth(body),
            StatusCode::UNPROCESSABLE_ENTITY => BrokerError::Rejected(body),
            StatusCode::BAD_REQUEST => BrokerError::Malformed(body),
            StatusCode::NOT_FOUND => BrokerError::OrderNotFound(body),
            StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited {
                retry_after_secs: retry_after,
            },
            s if s.is_server_error() => BrokerError::Transient(format!("{status}: {body}")),
            _ => BrokerError::Api(format!("{status}: {body}")),
        }
    }

    fn map_status(status: &str) -> OrderStatus {
        match status {
            "new" | "accepted" | "pending_new" => OrderStatus::Acknowledged,
            "partially_filled" => OrderStatus::PartiallyFilled,
            "filled" => OrderStatus::Filled,
            "canceled" | "expired" | "done_for_day" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            _ => OrderStatus::Submitted,
        }
    }

    fn parse_decimal(raw: &str) -> Result<Decimal, BrokerError> {
        Decimal::from_str(raw).map_err(|e| BrokerError::Api(format!("bad decimal {raw}: {e}")))
    }

    fn to_update(order: AlpacaOrder) -> Result<OrderUpdate, BrokerError> {
        let filled_qty = Self::parse_decimal(&order.filled_qty)?;
        let mut fills = Vec::new();

        // Alpaca reports aggregate fill state, not a fill stream;
        // represent it as one cumulative fill at the average price.
        if filled_qty > Decimal::ZERO {
            let price = order
                .filled_avg_price
                .as_deref()
                .map(Self::parse_decimal)
                .transpose()?
                .unwrap_or(Decimal::ZERO);
            let executed_at = order
                .filled_at
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            fills.push(FillReport {
                quantity: filled_qty,
                price,
                fee: Decimal::ZERO,
                executed_at,
            });
        }

        Ok(OrderUpdate {
            status: Self::map_status(&order.status),
            fills,
        })
    }
}

#[async_trait]
impl BrokerGateway for AlpacaGateway {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let url = format!(
            "{}/v2/stocks/{}/quotes/latest",
            self.config.data_url(),
            symbol
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("feed", "iex")])
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let data: AlpacaQuoteResponse = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        let timestamp = DateTime::parse_from_rfc3339(&data.quote.t)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);

        Ok(Quote {
            symbol: symbol.to_string(),
            bid: data.quote.bp,
            ask: data.quote.ap,
            timestamp,
        })
    }

    async fn get_options_chain(&self, symbol: &str) -> Result<Vec<OptionContract>, BrokerError> {
        let url = format!("{}/v2/options/contracts", self.config.base_url());
        let resp = self
            .client
            .get(&url)
            .query(&[("underlying_symbols", symbol), ("status", "active")])
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let data: AlpacaContractsResponse = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        let mut contracts = Vec::with_capacity(data.option_contracts.len());
        for c in data.option_contracts {
            let class = match c.contract_type.as_str() {
                "call" => InstrumentClass::Call,
                "put" => InstrumentClass::Put,
                other => return Err(BrokerError::Api(format!("unknown contract type {other}"))),
            };
            let expiry = NaiveDate::parse_from_str(&c.expiration_date, "%Y-%m-%d")
                .map_err(|e| BrokerError::Api(e.to_string()))?;
            let close = c
                .close_price
                .as_deref()
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0);
            contracts.push(OptionContract {
                underlying: c.underlying_symbol,
                class,
                strike: Self::parse_decimal(&c.strike_price)?,
                expiry,
                bid: close,
                ask: close,
            });
        }
        debug!(symbol, contracts = contracts.len(), "options chain fetched");
        Ok(contracts)
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderAck, BrokerError> {
        let (order_type, limit_price) = match order.order_type {
            OrderType::Market => ("market", None),
            OrderType::Limit { price } => ("limit", Some(price.to_string())),
        };

        let request = CreateOrderRequest {
            symbol: order.symbol.clone(),
            qty: order.quantity.to_string(),
            side: match order.side {
                Side::Buy => "buy".to_string(),
                Side::Sell => "sell".to_string(),
            },
            order_type: order_type.to_string(),
            time_in_force: "day".to_string(),
            limit_price,
            client_order_id: order.id.to_string(),
        };

        let url = format!("{}/v2/orders", self.config.base_url());
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

        let created: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        info!(order_id = %order.id, broker_order_id = %created.id, "order submitted");
        Ok(OrderAck {
            broker_order_id: created.id,
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError> {
        let url = format!("{}/v2/orders/{}", self.config.base_url(), broker_order_id);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }
        Ok(())
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError> {
        let url = format!("{}/v2/orders/{}", self.config.base_url(), broker_order_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let order: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;
        Self::to_update(order)
    }

    async fn lookup_order(
        &self,
        client_order_id: &str,
    ) -> Result<Option<(OrderAck, OrderUpdate)>, BrokerError> {
        let url = format!(
            "{}/v2/orders:by_client_order_id",
            self.config.base_url()
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("client_order_id", client_order_id)])
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let order: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;
        let ack = OrderAck {
            broker_order_id: order.id.clone(),
        };
        Ok(Some((ack, Self::to_update(order)?)))
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let url = format!("{}/v2/positions", self.config.base_url());
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp).await);
        }

        let raw: Vec<AlpacaPosition> = resp
            .json()
            .await
            .map_err(|e| BrokerError::Api(e.to_string()))?;

        raw.into_iter()
            .map(|p| {
                Ok(BrokerPosition {
                    symbol: p.symbol,
                    quantity: Self::parse_decimal(&p.qty)?,
                    avg_entry_price: Self::parse_decimal(&p.avg_entry_price)?,
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        "alpaca"
    }
}

#[async_trait]
impl PriceFeed for AlpacaGateway {
    async fn price_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = format!("{}/v2/stocks/{}/bars", self.config.data_url(), symbol);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("timeframe", "1Day"),
                ("start", &start.to_rfc3339()),
                ("end", &end.to_rfc3339()),
                ("adjustment", "split"),
                ("feed", "iex"),
                ("limit", "10000"),
            ])
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

        let data: AlpacaBarsResponse = resp
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        let bars = data.bars.unwrap_or_default();
        if bars.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        debug!(symbol, bars = bars.len(), "price history fetched");
        bars.iter().map(AlpacaBar::to_price_bar).collect()
    }

    async fn latest_bar(&self, symbol: &str) -> Result<Option<PriceBar>, DataError> {
        let url = format!(
            "{}/v2/stocks/{}/bars/latest",
            self.config.data_url(),
            symbol
        );
        let resp = self
            .client
            .get(&url)
            .query(&[("feed", "iex")])
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

        let data: AlpacaLatestBarResponse = resp
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        data.bar.as_ref().map(AlpacaBar::to_price_bar).transpose()
    }

    fn name(&self) -> &str {
        "alpaca"
    }
}
