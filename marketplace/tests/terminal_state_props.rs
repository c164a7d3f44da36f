//! Property tests over random action sequences driven through the booking reducer.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::Duration;
use proptest::prelude::*;
use std::sync::Arc;
use tourbook_core::reducer::Reducer;
use tourbook_marketplace::booking::{
    BookingAction, BookingEnvironment, BookingError, BookingReducer, NewBooking,
};
use tourbook_marketplace::settlement::SettlementPolicy;
use tourbook_marketplace::types::{
    Actor, Booking, BookingId, Decision, Money, PaymentReference, PaymentStatus, Role, Tour,
    TourId, User, UserId,
};
use tourbook_testing::{test_time, FixedClock};

const TOUR_IN_HOURS: i64 = 240;

struct Cast {
    tourist: User,
    guide: User,
    tour: Tour,
    stranger: Actor,
    admin: Actor,
}

fn cast(fee: u64) -> Cast {
    let tourist = User::new("Ana", "ana@example.com", Role::Tourist, test_time());
    let guide = User::new("Bo", "bo@example.com", Role::Guide, test_time());
    let tour = Tour {
        id: TourId::new(),
        guide_id: guide.id,
        title: "Harbour walk".to_string(),
        tour_fee: Money::from_cents(fee),
        duration_hours: 2,
        max_group_size: 10,
        is_active: true,
        created_at: test_time(),
    };
    Cast {
        tourist,
        guide,
        tour,
        stranger: Actor::tourist(UserId::new()),
        admin: Actor::admin(UserId::new()),
    }
}

fn env_at(hours: i64) -> BookingEnvironment {
    BookingEnvironment::new(
        Arc::new(FixedClock::new(test_time() + Duration::hours(hours))),
        SettlementPolicy::default(),
    )
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Pay(u8),
    Decide { by_guide: bool, accept: bool },
    Cancel(u8),
    Complete,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0_u8..2).prop_map(Step::Pay),
        (any::<bool>(), any::<bool>()).prop_map(|(by_guide, accept)| Step::Decide { by_guide, accept }),
        (0_u8..4).prop_map(Step::Cancel),
        Just(Step::Complete),
    ]
}

fn action(cast: &Cast, step: Step) -> BookingAction {
    match step {
        Step::Pay(n) => BookingAction::MarkPaid {
            reference: PaymentReference::new(format!("pay_{n}")),
            amount: None,
        },
        Step::Decide { by_guide, accept } => BookingAction::GuideDecision {
            actor: if by_guide { Actor::guide(cast.guide.id) } else { cast.stranger },
            decision: if accept { Decision::Accept } else { Decision::Decline },
        },
        Step::Cancel(who) => BookingAction::Cancel {
            actor: match who {
                0 => Actor::tourist(cast.tourist.id),
                1 => Actor::guide(cast.guide.id),
                2 => cast.admin,
                _ => cast.stranger,
            },
        },
        Step::Complete => BookingAction::Complete,
    }
}

fn created(cast: &Cast, people: u32) -> Option<Booking> {
    let mut state = None;
    BookingReducer::new()
        .reduce(
            &mut state,
            BookingAction::Create(Box::new(NewBooking {
                id: BookingId::new(),
                actor: Actor::tourist(cast.tourist.id),
                tourist: cast.tourist.clone(),
                guide: cast.guide.clone(),
                tour: cast.tour.clone(),
                date: test_time() + Duration::hours(TOUR_IN_HOURS),
                number_of_people: people,
                special_requests: None,
            })),
            &env_at(0),
        )
        .unwrap();
    state
}

proptest! {
    #[test]
    fn random_walks_respect_the_lifecycle(
        fee in 1_u64..100_000,
        people in 1_u32..=10,
        steps in prop::collection::vec((step(), 0_i64..400), 1..25),
    ) {
        let cast = cast(fee);
        let reducer = BookingReducer::new();
        let mut state = created(&cast, people);
        let total = state.as_ref().unwrap().total_amount;
        prop_assert_eq!(total, Money::from_cents(fee * u64::from(people)));

        for (step, hours) in steps {
            let before = state.clone().unwrap();
            let result = reducer.reduce(&mut state, action(&cast, step), &env_at(hours));
            let after = state.as_ref().unwrap();

            // The frozen total never moves.
            prop_assert_eq!(after.total_amount, total);

            match result {
                Ok(events) => {
                    if events.is_empty() {
                        prop_assert_eq!(&before, after);
                    } else {
                        prop_assert!(before.status.can_transition_to(after.status));
                    }
                },
                Err(err) => {
                    // Rejections leave the booking untouched.
                    prop_assert_eq!(&before, after);
                    if before.status.is_terminal() {
                        prop_assert!(matches!(err, BookingError::InvalidState(_) | BookingError::Forbidden(_)));
                    }
                },
            }

            if before.status.is_terminal() {
                prop_assert_eq!(before.status, after.status);
            }

            if let Some(settlement) = after.settlement {
                prop_assert_eq!(settlement.total(), total);
                prop_assert!(after.status.is_terminal());
            }
            if after.payment_status == PaymentStatus::Refunded {
                prop_assert!(after.settlement.is_some_and(|s| !s.refund_amount.is_zero()));
            }
        }
    }
}
