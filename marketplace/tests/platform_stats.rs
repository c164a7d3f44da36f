//! Platform statistics over a populated in-memory ledger.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::Marketplace;
use std::sync::Arc;
use tourbook_core::{BoxFuture, StoreError};
use tourbook_marketplace::ledger::{
    BookingFilter, InMemoryLedger, LedgerAggregates, MonthlyCount, MonthlyRevenue, TourFilter,
    UserFilter,
};
use tourbook_marketplace::stats::{PlatformAggregator, StatsError};
use tourbook_marketplace::types::{Booking, Decision, Money, PaymentReference, Role, User};
use tourbook_testing::FixedClock;

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn cents(value: u64) -> Money {
    Money::from_cents(value)
}

/// Create at `created`, pay, accept and complete just after the tour date.
async fn completed_booking(m: &Marketplace, created: DateTime<Utc>, people: u32) -> Booking {
    m.clock.set(created);
    let booking = paid_booking(m, people, Duration::days(5)).await;
    m.bookings
        .guide_decision(booking.id, m.as_guide(), Decision::Accept)
        .await
        .unwrap();
    m.clock.set(booking.date + Duration::hours(6));
    m.bookings.complete(booking.id).await.unwrap()
}

async fn paid_booking(m: &Marketplace, people: u32, ahead: Duration) -> Booking {
    let booking = m
        .bookings
        .create(m.as_tourist(), m.request(people, ahead))
        .await
        .unwrap();
    m.bookings
        .mark_paid(booking.id, PaymentReference::new(format!("pay_{}", booking.id)))
        .await
        .unwrap()
}

/// Wednesday 22 January 2025, 12:00 UTC.
fn reference_time() -> DateTime<Utc> {
    at(2025, 1, 22, 12)
}

async fn populated() -> Marketplace {
    let m = Marketplace::new();

    m.ledger
        .insert_user(User::new("Dee", "dee@example.com", Role::Tourist, at(2024, 12, 15, 9)))
        .unwrap();
    m.ledger
        .insert_user(User::new("Eli", "eli@example.com", Role::Guide, at(2025, 1, 22, 8)))
        .unwrap();

    completed_booking(&m, at(2024, 12, 10, 10), 2).await;
    completed_booking(&m, at(2025, 1, 2, 10), 3).await;

    m.clock.set(at(2025, 1, 3, 10));
    let refunded = paid_booking(&m, 1, Duration::days(12)).await;
    m.bookings.cancel(refunded.id, m.as_tourist()).await.unwrap();

    m.clock.set(at(2025, 1, 21, 10));
    m.bookings
        .create(m.as_tourist(), m.request(1, Duration::days(20)))
        .await
        .unwrap();

    m
}

#[tokio::test]
async fn snapshot_of_a_busy_month() {
    let m = populated().await;
    let aggregator = PlatformAggregator::new(m.ledger.clone(), Arc::new(FixedClock::new(reference_time())));

    let stats = aggregator.snapshot().await.unwrap();
    assert_eq!(stats.generated_at, reference_time());

    assert_eq!(stats.users.total, 5);
    assert_eq!(stats.users.guides, 2);
    assert_eq!(stats.users.tourists, 2);
    assert_eq!(stats.users.new_today, 1);
    assert_eq!(stats.users.new_this_week, 1);
    assert_eq!(stats.users.new_this_month, 4);
    assert_eq!(stats.users.growth_rate, 300);

    assert_eq!(stats.tours.total, 1);
    assert_eq!(stats.tours.active, 1);

    assert_eq!(stats.bookings.total, 4);
    assert_eq!(stats.bookings.completed, 2);
    assert_eq!(stats.bookings.cancelled, 1);
    assert_eq!(stats.bookings.pending, 1);
    assert_eq!(stats.bookings.completion_rate, 50);
    assert_eq!(stats.bookings.growth_rate, 200);

    assert_eq!(stats.revenue.total_revenue, cents(500));
    assert_eq!(stats.revenue.total_commission, cents(75));
    assert_eq!(stats.revenue.average_booking_value, cents(250));
    assert_eq!(stats.revenue.this_month, cents(300));
    assert_eq!(stats.revenue.previous_month, cents(200));
    assert_eq!(stats.revenue.growth_rate, 50);

    assert_eq!(
        stats.user_growth,
        vec![
            MonthlyCount { year: 2025, month: 1, count: 4 },
            MonthlyCount { year: 2024, month: 12, count: 1 },
        ]
    );
    assert_eq!(
        stats.revenue_by_month,
        vec![
            MonthlyRevenue { year: 2025, month: 1, revenue: cents(300), bookings: 1 },
            MonthlyRevenue { year: 2024, month: 12, revenue: cents(200), bookings: 1 },
        ]
    );
}

#[tokio::test]
async fn empty_platform_is_all_zeros() {
    let ledger = Arc::new(InMemoryLedger::new());
    let aggregator = PlatformAggregator::new(ledger, Arc::new(FixedClock::new(reference_time())));

    let stats = aggregator.snapshot().await.unwrap();
    assert_eq!(stats.users.total, 0);
    assert_eq!(stats.users.growth_rate, 0);
    assert_eq!(stats.bookings.completion_rate, 0);
    assert_eq!(stats.revenue.average_booking_value, Money::ZERO);
    assert_eq!(stats.revenue.growth_rate, 0);
    assert!(stats.user_growth.is_empty());
    assert!(stats.revenue_by_month.is_empty());
}

#[tokio::test]
async fn series_window_drops_old_months() {
    let m = populated().await;
    let aggregator = PlatformAggregator::new(m.ledger.clone(), Arc::new(FixedClock::new(reference_time())))
        .with_series_months(1);

    let stats = aggregator.snapshot().await.unwrap();
    assert_eq!(stats.user_growth.len(), 1);
    assert_eq!(stats.user_growth[0].month, 1);
    assert_eq!(stats.revenue_by_month.len(), 1);
    // Totals are not limited by the series window.
    assert_eq!(stats.revenue.total_revenue, cents(500));
}

/// Delegates to an in-memory ledger but fails every booking count.
struct BrokenBookings(InMemoryLedger);

impl LedgerAggregates for BrokenBookings {
    fn count_users(&self, filter: UserFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        self.0.count_users(filter)
    }

    fn count_tours(&self, filter: TourFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        self.0.count_tours(filter)
    }

    fn count_bookings(&self, _filter: BookingFilter) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async { Err(StoreError::DatabaseError("statement timeout".to_string())) })
    }

    fn sum_booking_amounts(&self, filter: BookingFilter) -> BoxFuture<'_, Result<Money, StoreError>> {
        self.0.sum_booking_amounts(filter)
    }

    fn users_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyCount>, StoreError>> {
        self.0.users_by_month(since)
    }

    fn revenue_by_month(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<MonthlyRevenue>, StoreError>> {
        self.0.revenue_by_month(since)
    }
}

#[tokio::test]
async fn one_failed_query_fails_the_whole_snapshot() {
    let aggregator = PlatformAggregator::new(
        Arc::new(BrokenBookings(InMemoryLedger::new())),
        Arc::new(FixedClock::new(reference_time())),
    );

    let err = aggregator.snapshot().await.unwrap_err();
    match err {
        StatsError::Aggregation { metric, source } => {
            assert!(metric.starts_with("bookings."), "unexpected metric {metric}");
            assert_eq!(source, StoreError::DatabaseError("statement timeout".to_string()));
        },
        other => panic!("expected an aggregation failure, got {other:?}"),
    }
}
