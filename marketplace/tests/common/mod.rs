//! Shared fixtures for the marketplace integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tourbook_core::environment::Clock;
use tourbook_marketplace::booking::{BookingEnvironment, BookingService, CreateBooking};
use tourbook_marketplace::ledger::InMemoryLedger;
use tourbook_marketplace::settlement::SettlementPolicy;
use tourbook_marketplace::types::{
    Actor, Booking, BookingStatus, Decision, Money, PaymentReference, Role, Tour, TourId, User,
};
use tourbook_testing::{test_time, ManualClock};

/// One guide with one tour, one tourist and one admin over an in-memory ledger.
pub struct Marketplace {
    pub clock: ManualClock,
    pub ledger: Arc<InMemoryLedger>,
    pub bookings: BookingService,
    pub tourist: User,
    pub guide: User,
    pub admin: User,
    pub tour: Tour,
}

impl Marketplace {
    /// Tour fee 100, groups up to 6, clock at [`test_time`].
    pub fn new() -> Self {
        let clock = ManualClock::new(test_time());
        let ledger = Arc::new(InMemoryLedger::new());

        let tourist = User::new("Ana", "ana@example.com", Role::Tourist, test_time());
        let mut guide = User::new("Bo", "bo@example.com", Role::Guide, test_time());
        guide.is_verified = true;
        let admin = User::new("Cy", "cy@example.com", Role::Admin, test_time());
        let tour = Tour {
            id: TourId::new(),
            guide_id: guide.id,
            title: "Old town walk".to_string(),
            tour_fee: Money::from_cents(100),
            duration_hours: 3,
            max_group_size: 6,
            is_active: true,
            created_at: test_time(),
        };

        ledger.insert_user(tourist.clone()).unwrap();
        ledger.insert_user(guide.clone()).unwrap();
        ledger.insert_user(admin.clone()).unwrap();
        ledger.insert_tour(tour.clone()).unwrap();

        let env = BookingEnvironment::new(Arc::new(clock.clone()), SettlementPolicy::default());
        let bookings = BookingService::new(ledger.clone(), env);

        Self {
            clock,
            ledger,
            bookings,
            tourist,
            guide,
            admin,
            tour,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn as_tourist(&self) -> Actor {
        Actor::tourist(self.tourist.id)
    }

    pub fn as_guide(&self) -> Actor {
        Actor::guide(self.guide.id)
    }

    pub fn as_admin(&self) -> Actor {
        Actor::admin(self.admin.id)
    }

    /// A request for `people` on a date `ahead` of now.
    pub fn request(&self, people: u32, ahead: Duration) -> CreateBooking {
        CreateBooking {
            guide_id: self.guide.id,
            tour_id: self.tour.id,
            date: self.now() + ahead,
            number_of_people: people,
            special_requests: None,
        }
    }

    /// Drive a fresh two-person booking, ten days out, into `status`.
    pub async fn booking_in(&self, status: BookingStatus) -> Booking {
        let booking = self
            .bookings
            .create(self.as_tourist(), self.request(2, Duration::days(10)))
            .await
            .expect("create");
        if status == BookingStatus::PendingPayment {
            return booking;
        }

        let booking = self
            .bookings
            .mark_paid(booking.id, PaymentReference::new(format!("pay_{}", booking.id)))
            .await
            .expect("mark_paid");
        match status {
            BookingStatus::Pending => booking,
            BookingStatus::Confirmed => self.accept(&booking).await,
            BookingStatus::Cancelled => self
                .bookings
                .cancel(booking.id, self.as_tourist())
                .await
                .expect("cancel"),
            BookingStatus::Completed => {
                let confirmed = self.accept(&booking).await;
                let back = self.now();
                self.clock.set(confirmed.date + Duration::hours(4));
                let completed = self.bookings.complete(confirmed.id).await.expect("complete");
                self.clock.set(back);
                completed
            },
            BookingStatus::PendingPayment => booking,
        }
    }

    async fn accept(&self, booking: &Booking) -> Booking {
        self.bookings
            .guide_decision(booking.id, self.as_guide(), Decision::Accept)
            .await
            .expect("accept")
    }
}
