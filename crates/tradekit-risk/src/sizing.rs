//! Fixed-fraction position sizing.

use rust_decimal::Decimal;
use tracing::debug;

use tradekit_core::error::SizingError;
use tradekit_core::types::RiskProfile;

/// Sizes entries as a fixed fraction of the account balance, rounded
/// down to whole units, and gates closes that would consume a day trade.
/// Exit quantities come from the open position and never pass through
/// sizing.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer;

impl PositionSizer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the entry quantity for one intent.
    ///
    /// `quantity = floor(balance * risk_fraction / price)`. Rejects the
    /// trade when the budget buys less than one unit or when the cost
    /// exceeds what the balance floor leaves deployable.
    pub fn size_entry(&self, profile: &RiskProfile, price: Decimal) -> Result<Decimal, SizingError> {
        let budget = profile.balance * profile.risk_fraction;
        let quantity = (budget / price).floor();

        if quantity <= Decimal::ZERO {
            return Err(SizingError::InsufficientFunds {
                required: price,
                available: budget,
            });
        }

        let cost = quantity * price;
        if cost > profile.deployable() {
            return Err(SizingError::InsufficientFunds {
                required: cost,
                available: profile.deployable(),
            });
        }

        debug!(
            account_id = profile.account_id,
            %price,
            %quantity,
            %cost,
            "entry sized"
        );

        Ok(quantity)
    }

    /// Gate a close that completes a same-session round trip. `used` is
    /// how many day trades the account has already consumed this session.
    pub fn check_day_trade(&self, profile: &RiskProfile, used: u32) -> Result<(), SizingError> {
        if profile.day_trades_remaining.saturating_sub(used) == 0 {
            return Err(SizingError::DayTradeLimitExceeded {
                account_id: profile.account_id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile(balance: Decimal, floor: Decimal, day_trades: u32) -> RiskProfile {
        RiskProfile {
            account_id: 1,
            balance,
            risk_fraction: dec!(0.02),
            min_balance_floor: floor,
            day_trades_remaining: day_trades,
        }
    }

    #[test]
    fn test_fixed_fraction_rounds_down() {
        let sizer = PositionSizer::new();
        // 10000 * 0.02 = 200 budget; 200 / 50 = 4 shares exactly
        let qty = sizer
            .size_entry(&profile(dec!(10000), dec!(0), 3), dec!(50))
            .unwrap();
        assert_eq!(qty, dec!(4));

        // 200 / 60 = 3.33 rounds down to 3
        let qty = sizer
            .size_entry(&profile(dec!(10000), dec!(0), 3), dec!(60))
            .unwrap();
        assert_eq!(qty, dec!(3));
    }

    #[test]
    fn test_budget_below_one_unit_rejected() {
        let sizer = PositionSizer::new();
        // Budget 200, price 500: can't afford a single share
        let err = sizer
            .size_entry(&profile(dec!(10000), dec!(0), 3), dec!(500))
            .unwrap_err();
        assert!(matches!(err, SizingError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_balance_floor_rejects() {
        let sizer = PositionSizer::new();
        // Budget 200 buys 4 @ 50, but only 100 is deployable above the floor
        let err = sizer
            .size_entry(&profile(dec!(10000), dec!(9900), 3), dec!(50))
            .unwrap_err();
        assert!(matches!(err, SizingError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_day_trade_gate() {
        let sizer = PositionSizer::new();

        // Allowance left: the round trip is permitted
        assert!(sizer.check_day_trade(&profile(dec!(10000), dec!(0), 3), 0).is_ok());
        assert!(sizer.check_day_trade(&profile(dec!(10000), dec!(0), 3), 2).is_ok());

        // Exhausted, whether configured at zero or consumed at runtime
        let err = sizer
            .check_day_trade(&profile(dec!(10000), dec!(0), 0), 0)
            .unwrap_err();
        assert!(matches!(err, SizingError::DayTradeLimitExceeded { .. }));
        let err = sizer
            .check_day_trade(&profile(dec!(10000), dec!(0), 3), 3)
            .unwrap_err();
        assert!(matches!(err, SizingError::DayTradeLimitExceeded { .. }));
    }
}
