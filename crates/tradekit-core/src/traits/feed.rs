//! Price feed trait.

use crate::error::DataError;
use crate::types::PriceBar;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for historical and latest price data.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch daily bars for a date range, ordered oldest to newest.
    async fn price_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, DataError>;

    /// Get the most recent bar for a symbol.
    async fn latest_bar(&self, symbol: &str) -> Result<Option<PriceBar>, DataError>;

    /// Get the feed name.
    fn name(&self) -> &str;
}
