//! Account risk profile.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-account sizing inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub account_id: i64,
    /// Cash balance available for new positions.
    pub balance: Decimal,
    /// Fraction of balance committed per position, e.g. 0.02.
    pub risk_fraction: Decimal,
    /// Balance must not drop below this floor after the trade.
    pub min_balance_floor: Decimal,
    /// Day trades still allowed in the current session.
    pub day_trades_remaining: u32,
}

impl RiskProfile {
    /// Maximum notional a new position may take without breaching the
    /// balance floor.
    pub fn deployable(&self) -> Decimal {
        (self.balance - self.min_balance_floor).max(Decimal::ZERO)
    }
}
