//! OHLCV price bar types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One OHLCV bar. Uses f64 for fast indicator calculations; immutable once
/// archived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl PriceBar {
    /// Create a new bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Typical price (HLC average), the base series for CCI and pivots.
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True range relative to the previous close (used for ADX/DMI).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => {
                let hl = self.high - self.low;
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => self.high - self.low,
        }
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp)
            .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
    }
}

/// Ordered bar history for one instrument.
///
/// Timestamps are strictly increasing; pushes that would violate the
/// ordering are dropped.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    /// Symbol identifier
    pub symbol: String,
    bars: VecDeque<PriceBar>,
    /// Maximum capacity (0 = unlimited)
    capacity: usize,
}

impl PriceSeries {
    /// Create a new empty series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: VecDeque::new(),
            capacity: 0,
        }
    }

    /// Create a series with a maximum capacity. When capacity is reached,
    /// the oldest bars are removed.
    pub fn with_capacity(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new bar. Returns false (and drops the bar) if its timestamp
    /// is not strictly greater than the last one.
    pub fn push(&mut self, bar: PriceBar) -> bool {
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return false;
            }
        }
        if self.capacity > 0 && self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        true
    }

    /// Push multiple bars, keeping only those in order.
    pub fn extend(&mut self, bars: impl IntoIterator<Item = PriceBar>) {
        for bar in bars {
            self.push(bar);
        }
    }

    /// Number of bars.
    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Check if the series is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get the last bar.
    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.back()
    }

    /// Get a bar by index (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    /// Extract close prices.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Extract high prices.
    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    /// Extract low prices.
    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    /// Get an iterator over the bars.
    pub fn iter(&self) -> impl Iterator<Item = &PriceBar> {
        self.bars.iter()
    }
}
