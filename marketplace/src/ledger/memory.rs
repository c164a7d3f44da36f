//! In-memory ledger for tests and local development.
//!
//! Records live in `RwLock`ed maps. Clones share the same maps. A poisoned lock is reported
//! as [`StoreError::DatabaseError`] rather than panicking.
//!
//! Payment references are unique across bookings, enforced through a reference index that
//! is only touched while the bookings write lock is held.
//!
//! Aggregate queries copy the rows they need under a short read lock and compute outside
//! it. They still share the table locks with booking writes, so this backend does not give
//! the isolation `PostgresLedger` gets from MVCC; it is meant for tests and local runs.

use super::{
    booking_key, BookingFilter, LedgerAggregates, LedgerStore, MonthlyCount, MonthlyRevenue,
    TourFilter, UserFilter, YearMonth,
};
use crate::types::{
    Booking, BookingId, BookingStatus, Money, PaymentReference, Role, Tour, TourId, User,
    UserFlags, UserId,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tourbook_core::{BoxFuture, StoreError, Version};

#[derive(Debug, Default)]
struct Tables {
    users: RwLock<HashMap<UserId, User>>,
    tours: RwLock<HashMap<TourId, Tour>>,
    bookings: RwLock<HashMap<BookingId, Booking>>,
    payment_references: RwLock<HashMap<PaymentReference, BookingId>>,
}

fn reference_key(reference: &PaymentReference) -> String {
    format!("payment_reference:{reference}")
}

/// Claim `booking`'s payment reference, if it has one. Call with the bookings write lock held.
fn claim_reference(
    index: &mut HashMap<PaymentReference, BookingId>,
    booking: &Booking,
) -> Result<(), StoreError> {
    let Some(reference) = &booking.payment_reference else {
        return Ok(());
    };
    match index.get(reference) {
        Some(owner) if *owner != booking.id => Err(StoreError::Duplicate(reference_key(reference))),
        Some(_) => Ok(()),
        None => {
            index.insert(reference.clone(), booking.id);
            Ok(())
        },
    }
}

/// Ledger held entirely in process memory.
///
/// # Example
///
/// ```
/// use tourbook_marketplace::ledger::InMemoryLedger;
/// use tourbook_marketplace::types::{Role, User};
/// use chrono::Utc;
///
/// let ledger = InMemoryLedger::new();
/// let guide = User::new("Bo", "bo@example.com", Role::Guide, Utc::now());
/// ledger.insert_user(guide).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    tables: Arc<Tables>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::DatabaseError("ledger lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::DatabaseError("ledger lock poisoned".to_string()))
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the lock is poisoned.
    pub fn insert_user(&self, user: User) -> Result<(), StoreError> {
        write(&self.tables.users)?.insert(user.id, user);
        Ok(())
    }

    /// Insert or replace a tour.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if the lock is poisoned.
    pub fn insert_tour(&self, tour: Tour) -> Result<(), StoreError> {
        write(&self.tables.tours)?.insert(tour.id, tour);
        Ok(())
    }

    /// Insert or replace a booking as-is, bypassing version checks.
    ///
    /// Meant for seeding historical data.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Duplicate`] if another booking already carries its payment reference
    /// - [`StoreError::DatabaseError`] if a lock is poisoned
    pub fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut bookings = write(&self.tables.bookings)?;
        claim_reference(&mut *write(&self.tables.payment_references)?, &booking)?;
        bookings.insert(booking.id, booking);
        Ok(())
    }

    /// Seed one guide with one tour and one tourist, for local development.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a lock is poisoned.
    pub fn seed_demo(&self, now: DateTime<Utc>) -> Result<DemoSeed, StoreError> {
        let mut guide = User::new("Demo Guide", "guide@tourbook.local", Role::Guide, now);
        guide.daily_rate = Some(Money::from_cents(25_000));
        guide.is_verified = true;
        let tourist = User::new("Demo Tourist", "tourist@tourbook.local", Role::Tourist, now);
        let admin = User::new("Demo Admin", "admin@tourbook.local", Role::Admin, now);
        let tour = Tour {
            id: TourId::new(),
            guide_id: guide.id,
            title: "Harbour and old town walk".to_string(),
            tour_fee: Money::from_cents(4_500),
            duration_hours: 3,
            max_group_size: 8,
            is_active: true,
            created_at: now - Duration::days(1),
        };

        let seed = DemoSeed {
            guide: guide.id,
            tourist: tourist.id,
            admin: admin.id,
            tour: tour.id,
        };
        self.insert_user(guide)?;
        self.insert_user(tourist)?;
        self.insert_user(admin)?;
        self.insert_tour(tour)?;
        Ok(seed)
    }

    fn bookings_matching(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<Booking> = read(&self.tables.bookings)?.values().cloned().collect();
        Ok(rows.into_iter().filter(|b| filter.matches(b)).collect())
    }

    fn users_snapshot(&self) -> Result<Vec<User>, StoreError> {
        Ok(read(&self.tables.users)?.values().cloned().collect())
    }
}

/// Ids created by [`InMemoryLedger::seed_demo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemoSeed {
    /// The guide
    pub guide: UserId,
    /// A tourist
    pub tourist: UserId,
    /// An admin
    pub admin: UserId,
    /// The guide's tour
    pub tour: TourId,
}

impl LedgerStore for InMemoryLedger {
    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        Box::pin(async move { Ok(read(&self.tables.users)?.get(&id).cloned()) })
    }

    fn get_tour(&self, id: TourId) -> BoxFuture<'_, Result<Option<Tour>, StoreError>> {
        Box::pin(async move { Ok(read(&self.tables.tours)?.get(&id).cloned()) })
    }

    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, StoreError>> {
        Box::pin(async move { Ok(read(&self.tables.bookings)?.get(&id).cloned()) })
    }

    fn create_booking(&self, booking: Booking) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut bookings = write(&self.tables.bookings)?;
            if bookings.contains_key(&booking.id) {
                return Err(StoreError::Duplicate(booking_key(booking.id)));
            }
            claim_reference(&mut *write(&self.tables.payment_references)?, &booking)?;
            bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn update_booking(
        &self,
        mut booking: Booking,
        expected: Version,
    ) -> BoxFuture<'_, Result<Booking, StoreError>> {
        Box::pin(async move {
            let mut bookings = write(&self.tables.bookings)?;
            let stored = bookings
                .get_mut(&booking.id)
                .ok_or_else(|| StoreError::RecordNotFound(booking_key(booking.id)))?;

            if stored.version != expected {
                return Err(StoreError::ConcurrencyConflict {
                    record: booking_key(booking.id),
                    expected,
                    actual: stored.version,
                });
            }
            claim_reference(&mut *write(&self.tables.payment_references)?, &booking)?;

            booking.version = expected.next();
            *stored = booking.clone();
            Ok(booking)
        })
    }

    fn due_for_completion(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Booking>, StoreError>> {
        Box::pin(async move {
            let mut due: Vec<Booking> = read(&self.tables.bookings)?
                .values()
                .filter(|b| b.status == BookingStatus::Confirmed && b.date <= now)
                .cloned()
                .collect();
            due.sort_by_key(|b| b.date);
            due.truncate(limit);
            Ok(due)
        })
    }

    fn update_user_flags(
        &self,
        id: UserId,
        flags: UserFlags,
    ) -> BoxFuture<'_, Result<User, StoreError>> {
        Box::pin(async move {
            let mut users = write(&self.tables.users)?;
            let user = users
                .get_mut(&id)
                .ok_or_else(|| StoreError::RecordNotFound(format!("user:{id}")))?;
            flags.apply(user);
            Ok(user.clone())
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move { read(&self.tables.bookings).map(|_| ()) })
    }
}

impl LedgerAggregates for InMemoryLedger {
    fn count_users(&self, filter: UserFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let users = self.users_snapshot()?;
            Ok(users.iter().filter(|u| filter.matches(u)).count() as u64)
        })
    }

    fn count_tours(&self, filter: TourFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move {
            let tours = read(&self.tables.tours)?;
            Ok(tours.values().filter(|t| filter.matches(t)).count() as u64)
        })
    }

    fn count_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move { Ok(self.bookings_matching(&filter)?.len() as u64) })
    }

    fn sum_booking_amounts(&self, filter: BookingFilter) -> BoxFuture<'_, Result<Money, StoreError>> {
        Box::pin(async move {
            Ok(self
                .bookings_matching(&filter)?
                .iter()
                .map(|b| b.total_amount)
                .sum())
        })
    }

    fn users_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyCount>, StoreError>> {
        Box::pin(async move {
            let mut months: BTreeMap<YearMonth, u64> = BTreeMap::new();
            for user in self.users_snapshot()? {
                if user.created_at >= since {
                    *months.entry(YearMonth::of(user.created_at)).or_default() += 1;
                }
            }
            Ok(months
                .into_iter()
                .rev()
                .map(|(ym, count)| MonthlyCount {
                    year: ym.year,
                    month: ym.month,
                    count,
                })
                .collect())
        })
    }

    fn revenue_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyRevenue>, StoreError>> {
        Box::pin(async move {
            let mut months: BTreeMap<YearMonth, (Money, u64)> = BTreeMap::new();
            for booking in self.bookings_matching(&BookingFilter::revenue())? {
                if booking.created_at >= since {
                    let entry = months.entry(YearMonth::of(booking.created_at)).or_default();
                    entry.0 = [entry.0, booking.total_amount].into_iter().sum();
                    entry.1 += 1;
                }
            }
            Ok(months
                .into_iter()
                .rev()
                .map(|(ym, (revenue, bookings))| MonthlyRevenue {
                    year: ym.year,
                    month: ym.month,
                    revenue,
                    bookings,
                })
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{PaymentStatus, TourId};
    use tourbook_testing::test_time;

    fn booking(created_at: DateTime<Utc>, status: BookingStatus, cents: u64) -> Booking {
        Booking {
            id: BookingId::new(),
            tourist_id: UserId::new(),
            guide_id: UserId::new(),
            tour_id: TourId::new(),
            date: created_at + Duration::days(7),
            number_of_people: 1,
            total_amount: Money::from_cents(cents),
            status,
            payment_status: if status == BookingStatus::PendingPayment {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Paid
            },
            special_requests: None,
            payment_reference: None,
            settlement: None,
            cancelled_by: None,
            created_at,
            paid_at: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            version: Version::INITIAL,
        }
    }

    #[tokio::test]
    async fn conditional_update_detects_stale_writer() {
        let ledger = InMemoryLedger::new();
        let original = booking(test_time(), BookingStatus::Pending, 100);
        ledger.create_booking(original.clone()).await.unwrap();

        let mut first = original.clone();
        first.status = BookingStatus::Confirmed;
        let stored = ledger.update_booking(first, Version::INITIAL).await.unwrap();
        assert_eq!(stored.version, Version::new(2));

        let mut second = original;
        second.status = BookingStatus::Cancelled;
        let err = ledger.update_booking(second, Version::INITIAL).await.unwrap_err();
        assert!(err.is_conflict());

        let current = ledger.get_booking(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn payment_reference_belongs_to_one_booking() {
        let ledger = InMemoryLedger::new();
        let first = booking(test_time(), BookingStatus::PendingPayment, 100);
        let second = booking(test_time(), BookingStatus::PendingPayment, 600);
        ledger.create_booking(first.clone()).await.unwrap();
        ledger.create_booking(second.clone()).await.unwrap();

        let mut paid = first;
        paid.status = BookingStatus::Pending;
        paid.payment_reference = Some(PaymentReference::new("ch_1"));
        let paid = ledger.update_booking(paid, Version::INITIAL).await.unwrap();

        let mut reused = second.clone();
        reused.status = BookingStatus::Pending;
        reused.payment_reference = Some(PaymentReference::new("ch_1"));
        let err = ledger.update_booking(reused, Version::INITIAL).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("payment_reference:ch_1".to_string()));
        let untouched = ledger.get_booking(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, BookingStatus::PendingPayment);

        // The owner may keep writing with its own reference.
        let mut confirmed = paid;
        confirmed.status = BookingStatus::Confirmed;
        let expected = confirmed.version;
        ledger.update_booking(confirmed, expected).await.unwrap();
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let ledger = InMemoryLedger::new();
        let b = booking(test_time(), BookingStatus::PendingPayment, 100);
        ledger.create_booking(b.clone()).await.unwrap();
        assert!(matches!(
            ledger.create_booking(b).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn due_for_completion_orders_and_limits() {
        let ledger = InMemoryLedger::new();
        let mut late = booking(test_time(), BookingStatus::Confirmed, 100);
        late.date = test_time() - Duration::days(1);
        let mut early = booking(test_time(), BookingStatus::Confirmed, 100);
        early.date = test_time() - Duration::days(3);
        let mut future = booking(test_time(), BookingStatus::Confirmed, 100);
        future.date = test_time() + Duration::days(1);
        let mut pending = booking(test_time(), BookingStatus::Pending, 100);
        pending.date = test_time() - Duration::days(2);

        for b in [late.clone(), early.clone(), future, pending] {
            ledger.insert_booking(b).unwrap();
        }

        let due = ledger.due_for_completion(test_time(), 10).await.unwrap();
        assert_eq!(due.iter().map(|b| b.id).collect::<Vec<_>>(), vec![early.id, late.id]);

        let capped = ledger.due_for_completion(test_time(), 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn revenue_groups_by_month_most_recent_first() {
        let ledger = InMemoryLedger::new();
        let jan = test_time();
        let feb = test_time() + Duration::days(40);
        ledger.insert_booking(booking(jan, BookingStatus::Completed, 100)).unwrap();
        ledger.insert_booking(booking(feb, BookingStatus::Completed, 250)).unwrap();
        ledger.insert_booking(booking(feb, BookingStatus::Completed, 50)).unwrap();
        ledger.insert_booking(booking(feb, BookingStatus::Cancelled, 999)).unwrap();

        let months = ledger.revenue_by_month(jan).await.unwrap();
        assert_eq!(
            months,
            vec![
                MonthlyRevenue { year: 2025, month: 2, revenue: Money::from_cents(300), bookings: 2 },
                MonthlyRevenue { year: 2025, month: 1, revenue: Money::from_cents(100), bookings: 1 },
            ]
        );

        let total = ledger.sum_booking_amounts(BookingFilter::revenue()).await.unwrap();
        assert_eq!(total, Money::from_cents(400));
    }

    #[tokio::test]
    async fn user_flags_update() {
        let ledger = InMemoryLedger::new();
        let user = User::new("T", "t@example.com", Role::Tourist, test_time());
        let id = user.id;
        ledger.insert_user(user).unwrap();

        let updated = ledger
            .update_user_flags(id, UserFlags { is_active: Some(false), is_verified: None })
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert!(!updated.is_verified);

        let missing = ledger.update_user_flags(UserId::new(), UserFlags::default()).await;
        assert!(matches!(missing, Err(StoreError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn seed_demo_creates_bookable_tour() {
        let ledger = InMemoryLedger::new();
        let seed = ledger.seed_demo(test_time()).unwrap();
        let tour = ledger.get_tour(seed.tour).await.unwrap().unwrap();
        assert_eq!(tour.guide_id, seed.guide);
        assert_eq!(ledger.count_users(UserFilter::default()).await.unwrap(), 3);
    }
}
