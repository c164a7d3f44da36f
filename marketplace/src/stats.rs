//! Platform statistics for admins.
//!
//! [`PlatformAggregator::snapshot`] issues every ledger query at once and assembles a
//! [`PlatformStats`] only if all of them succeed. A single failed query fails the
//! snapshot; partial or zeroed numbers are never returned.
//!
//! Calendar windows are aligned to UTC midnight of the aggregator's clock and are
//! half-open. Weeks start on Monday.

use crate::ledger::{
    BookingFilter, LedgerAggregates, MonthlyCount, MonthlyRevenue, TimeWindow, TourFilter,
    UserFilter,
};
use crate::metrics;
use crate::settlement::SettlementPolicy;
use crate::types::{BookingStatus, Money, Role};
use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use futures::TryFutureExt;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tourbook_core::environment::Clock;
use tourbook_core::{BoxFuture, StoreError};

/// Why a snapshot could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// One of the ledger queries failed
    #[error("failed to aggregate {metric}: {source}")]
    Aggregation {
        /// Which figure was being computed
        metric: &'static str,
        /// The ledger failure
        #[source]
        source: StoreError,
    },

    /// The reference clock produced a date the calendar cannot represent
    #[error("calendar error: {0}")]
    Calendar(String),
}

/// The calendar windows a snapshot is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindows {
    /// Since midnight today
    pub today: TimeWindow,
    /// Since Monday midnight
    pub this_week: TimeWindow,
    /// Since the first of this month
    pub this_month: TimeWindow,
    /// The whole previous month
    pub previous_month: TimeWindow,
}

impl CalendarWindows {
    /// Windows containing `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Calendar`] at the edges of the representable calendar.
    pub fn at(now: DateTime<Utc>) -> Result<Self, StatsError> {
        let today = now.date_naive();
        let midnight = today.and_time(NaiveTime::MIN).and_utc();
        let monday = midnight - Duration::days(i64::from(today.weekday().num_days_from_monday()));

        let first = today
            .with_day(1)
            .ok_or_else(|| StatsError::Calendar(format!("no first day of month for {today}")))?;
        let next_first = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| StatsError::Calendar(format!("no month after {first}")))?;
        let previous_first = first
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| StatsError::Calendar(format!("no month before {first}")))?;

        let at_midnight = |date: chrono::NaiveDate| date.and_time(NaiveTime::MIN).and_utc();

        Ok(Self {
            today: TimeWindow::new(midnight, midnight + Duration::days(1)),
            this_week: TimeWindow::new(monday, monday + Duration::days(7)),
            this_month: TimeWindow::new(at_midnight(first), at_midnight(next_first)),
            previous_month: TimeWindow::new(at_midnight(previous_first), at_midnight(first)),
        })
    }

    /// Start of the month `months - 1` months before this one, so the series covers
    /// `months` calendar months including the current one.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Calendar`] if the date underflows.
    pub fn series_start(&self, months: u32) -> Result<DateTime<Utc>, StatsError> {
        let back = months.saturating_sub(1);
        self.this_month
            .start
            .checked_sub_months(Months::new(back))
            .ok_or_else(|| StatsError::Calendar(format!("cannot go back {back} months")))
    }
}

/// Month-over-month growth in percent, rounded to the nearest integer.
///
/// `100` when the previous value is zero and the current is not; `0` when both are zero.
/// Shrinking yields a negative rate.
#[must_use]
pub fn growth_rate(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return if current == 0 { 0 } else { 100 };
    }
    let previous = i128::from(previous);
    let diff = (i128::from(current) - previous) * 100;
    // Round half away from zero.
    let rounded = if diff >= 0 {
        (2 * diff + previous) / (2 * previous)
    } else {
        -((-2 * diff + previous) / (2 * previous))
    };
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

/// `part` as a rounded percentage of `whole`; `0` when `whole` is zero.
#[must_use]
pub fn percent_of(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u128::from(part), u128::from(whole));
    u32::try_from((200 * part + whole) / (2 * whole)).unwrap_or(u32::MAX)
}

/// User counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// All users
    pub total: u64,
    /// Users with the guide role
    pub guides: u64,
    /// Users with the tourist role
    pub tourists: u64,
    /// Registered since midnight
    pub new_today: u64,
    /// Registered since Monday
    pub new_this_week: u64,
    /// Registered since the first of the month
    pub new_this_month: u64,
    /// Registrations this month against the previous month
    pub growth_rate: i64,
}

/// Tour counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TourStats {
    /// All tours
    pub total: u64,
    /// Tours open for booking
    pub active: u64,
}

/// Booking counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingStats {
    /// All bookings
    pub total: u64,
    /// Completed bookings
    pub completed: u64,
    /// Cancelled bookings
    pub cancelled: u64,
    /// Bookings still in progress (awaiting payment, decision or the tour date)
    pub pending: u64,
    /// Completed as a percentage of all bookings
    pub completion_rate: u32,
    /// Bookings created this month against the previous month
    pub growth_rate: i64,
}

/// Revenue figures, in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueStats {
    /// Sum of totals of completed, paid bookings
    pub total_revenue: Money,
    /// Platform commission on `total_revenue`
    pub total_commission: Money,
    /// `total_revenue` over completed bookings; zero when there are none
    pub average_booking_value: Money,
    /// Revenue from bookings created this month
    pub this_month: Money,
    /// Revenue from bookings created in the previous month
    pub previous_month: Money,
    /// This month's revenue against the previous month
    pub growth_rate: i64,
}

/// One consistent read of platform health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    /// Reference time of the snapshot
    pub generated_at: DateTime<Utc>,
    /// Users
    pub users: UserStats,
    /// Tours
    pub tours: TourStats,
    /// Bookings
    pub bookings: BookingStats,
    /// Revenue
    pub revenue: RevenueStats,
    /// Registrations per month, most recent first
    pub user_growth: Vec<MonthlyCount>,
    /// Revenue per month, most recent first
    pub revenue_by_month: Vec<MonthlyRevenue>,
}

/// Builds [`PlatformStats`] from read-only ledger aggregates.
#[derive(Clone)]
pub struct PlatformAggregator {
    ledger: Arc<dyn LedgerAggregates>,
    clock: Arc<dyn Clock>,
    policy: SettlementPolicy,
    series_months: u32,
}

fn labelled<'a, T: 'a>(
    metric: &'static str,
    query: BoxFuture<'a, Result<T, StoreError>>,
) -> impl Future<Output = Result<T, StatsError>> + 'a {
    query.map_err(move |source| StatsError::Aggregation { metric, source })
}

impl PlatformAggregator {
    /// Aggregator with the default policy and a twelve month series.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerAggregates>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            clock,
            policy: SettlementPolicy::default(),
            series_months: 12,
        }
    }

    /// Use `policy` for the commission figure.
    #[must_use]
    pub const fn with_policy(mut self, policy: SettlementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cover `months` calendar months in the series (at least one).
    #[must_use]
    pub fn with_series_months(mut self, months: u32) -> Self {
        self.series_months = months.max(1);
        self
    }

    /// Produce a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Aggregation`] naming the first figure whose query failed.
    pub async fn snapshot(&self) -> Result<PlatformStats, StatsError> {
        let started = Instant::now();
        let now = self.clock.now();
        let windows = CalendarWindows::at(now)?;
        let since = windows.series_start(self.series_months)?;
        let ledger = &self.ledger;

        let users = move |role: Option<Role>, created: Option<TimeWindow>| {
            ledger.count_users(UserFilter { role, created })
        };
        let in_progress = [
            BookingStatus::PendingPayment,
            BookingStatus::Pending,
            BookingStatus::Confirmed,
        ];

        let result = futures::try_join!(
            labelled("users.total", users(None, None)),
            labelled("users.guides", users(Some(Role::Guide), None)),
            labelled("users.tourists", users(Some(Role::Tourist), None)),
            labelled("users.new_today", users(None, Some(windows.today))),
            labelled("users.new_this_week", users(None, Some(windows.this_week))),
            labelled("users.new_this_month", users(None, Some(windows.this_month))),
            labelled("users.previous_month", users(None, Some(windows.previous_month))),
            labelled("tours.total", ledger.count_tours(TourFilter::default())),
            labelled("tours.active", ledger.count_tours(TourFilter { active: Some(true) })),
            labelled("bookings.total", ledger.count_bookings(BookingFilter::all())),
            labelled(
                "bookings.completed",
                ledger.count_bookings(BookingFilter::with_statuses(&[BookingStatus::Completed])),
            ),
            labelled(
                "bookings.cancelled",
                ledger.count_bookings(BookingFilter::with_statuses(&[BookingStatus::Cancelled])),
            ),
            labelled(
                "bookings.pending",
                ledger.count_bookings(BookingFilter::with_statuses(&in_progress)),
            ),
            labelled(
                "bookings.this_month",
                ledger.count_bookings(BookingFilter::all().created_in(windows.this_month)),
            ),
            labelled(
                "bookings.previous_month",
                ledger.count_bookings(BookingFilter::all().created_in(windows.previous_month)),
            ),
            labelled("revenue.total", ledger.sum_booking_amounts(BookingFilter::revenue())),
            labelled(
                "revenue.this_month",
                ledger.sum_booking_amounts(BookingFilter::revenue().created_in(windows.this_month)),
            ),
            labelled(
                "revenue.previous_month",
                ledger.sum_booking_amounts(
                    BookingFilter::revenue().created_in(windows.previous_month)
                ),
            ),
            labelled("series.user_growth", ledger.users_by_month(since)),
            labelled("series.revenue", ledger.revenue_by_month(since)),
        );

        let (
            users_total,
            guides,
            tourists,
            new_today,
            new_this_week,
            new_this_month,
            users_previous_month,
            tours_total,
            tours_active,
            bookings_total,
            completed,
            cancelled,
            pending,
            bookings_this_month,
            bookings_previous_month,
            total_revenue,
            revenue_this_month,
            revenue_previous_month,
            user_growth,
            revenue_by_month,
        ) = result.inspect_err(|err| {
            tracing::warn!(error = %err, "Platform statistics snapshot failed");
        })?;

        let stats = PlatformStats {
            generated_at: now,
            users: UserStats {
                total: users_total,
                guides,
                tourists,
                new_today,
                new_this_week,
                new_this_month,
                growth_rate: growth_rate(new_this_month, users_previous_month),
            },
            tours: TourStats {
                total: tours_total,
                active: tours_active,
            },
            bookings: BookingStats {
                total: bookings_total,
                completed,
                cancelled,
                pending,
                completion_rate: percent_of(completed, bookings_total),
                growth_rate: growth_rate(bookings_this_month, bookings_previous_month),
            },
            revenue: RevenueStats {
                total_revenue,
                total_commission: self.policy.commission(total_revenue),
                average_booking_value: total_revenue.average_over(completed),
                this_month: revenue_this_month,
                previous_month: revenue_previous_month,
                growth_rate: growth_rate(revenue_this_month.cents(), revenue_previous_month.cents()),
            },
            user_growth,
            revenue_by_month,
        };

        let elapsed = started.elapsed();
        metrics::record_stats_duration(elapsed);
        tracing::debug!(elapsed_ms = elapsed.as_millis(), "Platform statistics snapshot built");
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn growth_rate_edges() {
        assert_eq!(growth_rate(0, 0), 0);
        assert_eq!(growth_rate(5, 0), 100);
        assert_eq!(growth_rate(10, 10), 0);
        assert_eq!(growth_rate(15, 10), 50);
        assert_eq!(growth_rate(5, 10), -50);
        assert_eq!(growth_rate(0, 7), -100);
        assert_eq!(growth_rate(2, 3), -33);
        assert_eq!(growth_rate(4, 3), 33);
        assert_eq!(growth_rate(5, 3), 67);
        // 1/8 = 12.5% rounds away from zero
        assert_eq!(growth_rate(9, 8), 13);
        assert_eq!(growth_rate(7, 8), -13);
    }

    #[test]
    fn completion_rate_rounds() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(5, 5), 100);
    }

    #[test]
    fn windows_align_to_midnight_and_monday() {
        // Wednesday 2025-01-01 15:00 UTC
        let windows = CalendarWindows::at(at(2025, 1, 1, 15)).unwrap();
        assert_eq!(windows.today, TimeWindow::new(at(2025, 1, 1, 0), at(2025, 1, 2, 0)));
        assert_eq!(windows.this_week.start, at(2024, 12, 30, 0));
        assert_eq!(windows.this_week.end, at(2025, 1, 6, 0));
        assert_eq!(windows.this_month, TimeWindow::new(at(2025, 1, 1, 0), at(2025, 2, 1, 0)));
        assert_eq!(
            windows.previous_month,
            TimeWindow::new(at(2024, 12, 1, 0), at(2025, 1, 1, 0))
        );
    }

    #[test]
    fn monday_is_its_own_week_start() {
        let windows = CalendarWindows::at(at(2025, 3, 10, 0)).unwrap();
        assert_eq!(windows.this_week.start, at(2025, 3, 10, 0));
    }

    #[test]
    fn series_start_covers_requested_months() {
        let windows = CalendarWindows::at(at(2025, 3, 15, 12)).unwrap();
        assert_eq!(windows.series_start(12).unwrap(), at(2024, 4, 1, 0));
        assert_eq!(windows.series_start(1).unwrap(), at(2025, 3, 1, 0));
    }
}
