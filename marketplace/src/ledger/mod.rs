//! The ledger: durable records behind the marketplace.
//!
//! Two traits split the contract by access pattern:
//!
//! - [`LedgerStore`]: point reads and conditional writes used by the booking lifecycle
//! - [`LedgerAggregates`]: read-only counts, sums and monthly groupings used by the
//!   platform statistics
//!
//! Both are dyn-compatible (`Arc<dyn LedgerStore>`), returning [`BoxFuture`]s.
//!
//! Writes to a booking are conditional on the version the writer read. A mismatch is
//! reported as [`StoreError::ConcurrencyConflict`] and nothing is written.

mod memory;
mod postgres;

pub use memory::{DemoSeed, InMemoryLedger};
pub use postgres::PostgresLedger;

use crate::types::{
    Booking, BookingId, BookingStatus, Money, PaymentStatus, Role, Tour, TourId, User, UserFlags,
    UserId,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tourbook_core::{BoxFuture, StoreError, Version};

/// Half-open time range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Which users to count. Unset fields match everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Only this role
    pub role: Option<Role>,
    /// Only users registered inside this window
    pub created: Option<TimeWindow>,
}

impl UserFilter {
    /// True when the user matches.
    #[must_use]
    pub fn matches(&self, user: &User) -> bool {
        self.role.is_none_or(|role| user.role == role)
            && self.created.is_none_or(|w| w.contains(user.created_at))
    }
}

/// Which tours to count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TourFilter {
    /// Only tours with this `is_active` flag
    pub active: Option<bool>,
}

impl TourFilter {
    /// True when the tour matches.
    #[must_use]
    pub fn matches(&self, tour: &Tour) -> bool {
        self.active.is_none_or(|active| tour.is_active == active)
    }
}

/// Which bookings to count or sum.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingFilter {
    /// Any of these statuses; empty matches all
    pub statuses: Vec<BookingStatus>,
    /// Only this payment status
    pub payment_status: Option<PaymentStatus>,
    /// Only bookings created inside this window
    pub created: Option<TimeWindow>,
}

impl BookingFilter {
    /// All bookings.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Bookings in one of `statuses`.
    #[must_use]
    pub fn with_statuses(statuses: &[BookingStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    /// Completed and paid: the bookings that count as revenue.
    #[must_use]
    pub fn revenue() -> Self {
        Self {
            statuses: vec![BookingStatus::Completed],
            payment_status: Some(PaymentStatus::Paid),
            created: None,
        }
    }

    /// Restrict to bookings created inside `window`.
    #[must_use]
    pub fn created_in(mut self, window: TimeWindow) -> Self {
        self.created = Some(window);
        self
    }

    /// True when the booking matches.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&booking.status))
            && self.payment_status.is_none_or(|p| booking.payment_status == p)
            && self.created.is_none_or(|w| w.contains(booking.created_at))
    }
}

/// A calendar month in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    /// Calendar year
    pub year: i32,
    /// Month, 1 through 12
    pub month: u32,
}

impl YearMonth {
    /// The month containing `at`.
    #[must_use]
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

/// Users registered in one month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    /// Calendar year
    pub year: i32,
    /// Month, 1 through 12
    pub month: u32,
    /// Registrations
    pub count: u64,
}

/// Revenue from completed, paid bookings created in one month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// Calendar year
    pub year: i32,
    /// Month, 1 through 12
    pub month: u32,
    /// Sum of booking totals
    pub revenue: Money,
    /// Number of bookings behind `revenue`
    pub bookings: u64,
}

/// Record access for the booking lifecycle.
pub trait LedgerStore: Send + Sync {
    /// Load a user.
    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, StoreError>>;

    /// Load a tour.
    fn get_tour(&self, id: TourId) -> BoxFuture<'_, Result<Option<Tour>, StoreError>>;

    /// Load a booking.
    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, StoreError>>;

    /// Persist a new booking. Fails with [`StoreError::Duplicate`] if the id is taken.
    fn create_booking(&self, booking: Booking) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Replace a booking if its stored version is still `expected`.
    ///
    /// Returns the stored booking, whose version is `expected.next()`.
    fn update_booking(
        &self,
        booking: Booking,
        expected: Version,
    ) -> BoxFuture<'_, Result<Booking, StoreError>>;

    /// Confirmed bookings whose tour date is at or before `now`, oldest first.
    fn due_for_completion(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Booking>, StoreError>>;

    /// Apply admin account flags. Fails with [`StoreError::RecordNotFound`] for unknown users.
    fn update_user_flags(&self, id: UserId, flags: UserFlags)
    -> BoxFuture<'_, Result<User, StoreError>>;

    /// Cheap connectivity check.
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Read-only aggregates for platform statistics.
pub trait LedgerAggregates: Send + Sync {
    /// Count users.
    fn count_users(&self, filter: UserFilter) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Count tours.
    fn count_tours(&self, filter: TourFilter) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Count bookings.
    fn count_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Sum `total_amount` over bookings.
    fn sum_booking_amounts(&self, filter: BookingFilter) -> BoxFuture<'_, Result<Money, StoreError>>;

    /// Registrations per month since `since`, most recent month first.
    fn users_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyCount>, StoreError>>;

    /// Revenue per month (by booking creation) since `since`, most recent month first.
    fn revenue_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyRevenue>, StoreError>>;
}

fn booking_key(id: BookingId) -> String {
    format!("booking:{id}")
}
