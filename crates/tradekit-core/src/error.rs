//! Error types for the trading decision engine.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Sizing rejected: {0}")]
    Sizing(#[from] SizingError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration resolution errors.
///
/// Fatal to the affected instrument pass only; the scheduler skips the
/// instrument and continues with the rest.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration key: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    /// Not enough history for the window. Non-fatal: the indicator is
    /// omitted from the snapshot.
    #[error("Insufficient data: need {required} bars, have {available}")]
    DataGap { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Price feed errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Risk & sizing rejections. The intent is dropped; no order is created.
#[derive(Error, Debug)]
pub enum SizingError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Day trade limit exceeded for account {account_id}")]
    DayTradeLimitExceeded { account_id: i64 },
}

/// Broker gateway errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    /// Terminal rejection of an order. Never retried automatically.
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Transient broker failure: {0}")]
    Transient(String),

    /// The call timed out. Outcome is unknown: the broker may still have
    /// accepted the request, so callers must reconcile rather than assume
    /// failure.
    #[error("Broker call timed out")]
    Timeout,

    /// Circuit breaker is open for this broker.
    #[error("Broker unavailable: circuit open for {cooldown_secs} more seconds")]
    Unavailable { cooldown_secs: u64 },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("API error: {0}")]
    Api(String),
}

impl BrokerError {
    /// Transient failures are retried with backoff; everything else
    /// surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Transient(_) | BrokerError::RateLimited { .. } | BrokerError::Timeout
        )
    }
}

/// Ledger integrity errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Closing trade exceeds the open lots on record. Indicates corrupted
    /// or missing trade history; trading for the pair halts until manually
    /// reconciled.
    #[error("Lot underflow for account {account_id} {symbol}: {missing} units uncovered")]
    LotUnderflow {
        account_id: i64,
        symbol: String,
        missing: Decimal,
    },

    #[error("Trading halted for account {account_id} {symbol} pending reconciliation")]
    Halted { account_id: i64, symbol: String },
}

/// Order lifecycle errors.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Order {0} already has fills and cannot be cancelled")]
    AlreadyFilled(Uuid),

    #[error("Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Order not found: {0}")]
    NotFound(Uuid),
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
