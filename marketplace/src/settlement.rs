//! Settlement: how the money of a booking is split when it ends.
//!
//! Every function here is pure. Time enters only as the `time_until_tour` argument, so
//! the refund schedule can be tested at its exact boundaries without a clock.
//!
//! All amounts are integer cents; percentages are rounded half up. For every settlement,
//! `refund + commission + payout == total`.

use crate::types::Money;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who ended the booking early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    /// The tourist cancelled; the refund depends on how far away the tour is.
    Tourist,
    /// The guide cancelled or declined; full refund.
    Guide,
    /// The platform cancelled (admin action); full refund.
    ForceMajeure,
}

impl CancelledBy {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tourist => "tourist",
            Self::Guide => "guide",
            Self::ForceMajeure => "force_majeure",
        }
    }
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CancelledBy {
    type Err = crate::types::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Tourist, Self::Guide, Self::ForceMajeure]
            .into_iter()
            .find(|by| by.as_str() == s)
            .ok_or_else(|| crate::types::ParseEnumError::new("cancelled_by", s))
    }
}

/// The split of a booking's total between tourist, platform and guide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Returned to the tourist
    pub refund_amount: Money,
    /// Kept by the platform
    pub commission_amount: Money,
    /// Paid to the guide
    pub payout_amount: Money,
}

impl Settlement {
    /// Sum of the three parts.
    #[must_use]
    pub fn total(&self) -> Money {
        [self.refund_amount, self.commission_amount, self.payout_amount]
            .into_iter()
            .sum()
    }
}

/// Longest refund window a policy may configure: one year.
pub const MAX_REFUND_WINDOW_HOURS: i64 = 24 * 365;

/// Refund schedule and commission rate.
///
/// Defaults: full refund from 168 hours (7 days) out, half from 48 hours, nothing closer
/// than that; 15% commission on completed bookings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    /// Platform cut of a completed booking, in percent
    pub commission_percent: u32,
    /// A tourist cancelling at least this many hours ahead gets everything back
    pub full_refund_hours: i64,
    /// A tourist cancelling at least this many hours ahead gets `partial_refund_percent` back
    pub partial_refund_hours: i64,
    /// Refund for the partial window, in percent
    pub partial_refund_percent: u32,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            commission_percent: 15,
            full_refund_hours: 168,
            partial_refund_hours: 48,
            partial_refund_percent: 50,
        }
    }
}

impl SettlementPolicy {
    /// Refund percentage for a cancellation.
    ///
    /// Window lower bounds are inclusive: exactly `full_refund_hours` ahead is a full refund.
    /// A window too wide for [`Duration`] is never reached.
    #[must_use]
    pub fn refund_percent(&self, cancelled_by: CancelledBy, time_until_tour: Duration) -> u32 {
        let ahead_of =
            |hours: i64| Duration::try_hours(hours).is_some_and(|window| time_until_tour >= window);
        match cancelled_by {
            CancelledBy::Guide | CancelledBy::ForceMajeure => 100,
            CancelledBy::Tourist if ahead_of(self.full_refund_hours) => 100,
            CancelledBy::Tourist if ahead_of(self.partial_refund_hours) => {
                self.partial_refund_percent
            },
            CancelledBy::Tourist => 0,
        }
    }

    /// Settle a cancellation. Cancellations earn no commission.
    #[must_use]
    pub fn settle(
        &self,
        total_amount: Money,
        cancelled_by: CancelledBy,
        time_until_tour: Duration,
    ) -> Settlement {
        let refund_amount = total_amount.percent(self.refund_percent(cancelled_by, time_until_tour));
        Settlement {
            refund_amount,
            commission_amount: Money::ZERO,
            payout_amount: total_amount.saturating_sub(refund_amount),
        }
    }

    /// Settle a completed, paid booking: commission to the platform, the rest to the guide.
    #[must_use]
    pub fn settle_completion(&self, total_amount: Money) -> Settlement {
        let commission_amount = self.commission(total_amount);
        Settlement {
            refund_amount: Money::ZERO,
            commission_amount,
            payout_amount: total_amount.saturating_sub(commission_amount),
        }
    }

    /// Commission owed on `amount` of completed revenue.
    #[must_use]
    pub fn commission(&self, amount: Money) -> Money {
        amount.percent(self.commission_percent)
    }
}

/// [`SettlementPolicy::settle`] under the default policy.
#[must_use]
pub fn settle(total_amount: Money, cancelled_by: CancelledBy, time_until_tour: Duration) -> Settlement {
    SettlementPolicy::default().settle(total_amount, cancelled_by, time_until_tour)
}

/// [`SettlementPolicy::settle_completion`] under the default policy.
#[must_use]
pub fn settle_completion(total_amount: Money) -> Settlement {
    SettlementPolicy::default().settle_completion(total_amount)
}
