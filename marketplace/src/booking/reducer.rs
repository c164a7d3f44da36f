//! The booking state machine.
//!
//! Every status change goes through [`BookingStatus::can_transition_to`]. Guards are
//! evaluated before anything is written to the state, so a rejected action leaves the
//! booking exactly as it was.

use super::{BookingAction, BookingEnvironment, BookingError, BookingEvent, NewBooking};
use crate::settlement::CancelledBy;
use crate::types::{
    Actor, Booking, BookingStatus, Decision, Money, PaymentReference, PaymentStatus, Role,
};
use tourbook_core::reducer::Reducer;
use tourbook_core::{smallvec, SmallVec, Version};

type Events = SmallVec<[BookingEvent; 4]>;

/// Pure reducer over a single (possibly not yet existing) booking.
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Create a reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for BookingReducer {
    type State = Option<Booking>;
    type Action = BookingAction;
    type Event = BookingEvent;
    type Error = BookingError;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Option<Booking>,
        action: BookingAction,
        env: &BookingEnvironment,
    ) -> Result<Events, BookingError> {
        match action {
            BookingAction::Create(new) => create(state, *new, env),
            BookingAction::MarkPaid { reference, amount } => {
                mark_paid(existing(state)?, reference, amount, env)
            },
            BookingAction::GuideDecision { actor, decision } => {
                guide_decision(existing(state)?, actor, decision, env)
            },
            BookingAction::Cancel { actor } => cancel(existing(state)?, actor, env),
            BookingAction::Complete => complete(existing(state)?, env),
        }
    }
}

fn existing(state: &mut Option<Booking>) -> Result<&mut Booking, BookingError> {
    state
        .as_mut()
        .ok_or_else(|| BookingError::InvalidState("booking does not exist".to_string()))
}

fn ensure_transition(booking: &Booking, next: BookingStatus) -> Result<(), BookingError> {
    if booking.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(BookingError::InvalidState(format!(
            "booking is {} and cannot become {next}",
            booking.status
        )))
    }
}

fn create(
    state: &mut Option<Booking>,
    new: NewBooking,
    env: &BookingEnvironment,
) -> Result<Events, BookingError> {
    if state.is_some() {
        return Err(BookingError::InvalidState("booking already exists".to_string()));
    }
    if new.actor.role != Role::Tourist || new.actor.id != new.tourist.id {
        return Err(BookingError::Forbidden("only tourists can book tours".to_string()));
    }
    if !new.tourist.is_active {
        return Err(BookingError::Forbidden("account is deactivated".to_string()));
    }
    if new.guide.role != Role::Guide {
        return Err(BookingError::Validation(format!("user {} is not a guide", new.guide.id)));
    }
    if !new.guide.is_active {
        return Err(BookingError::Validation("guide is not accepting bookings".to_string()));
    }
    if new.tour.guide_id != new.guide.id {
        return Err(BookingError::Validation(format!(
            "tour {} is not offered by guide {}",
            new.tour.id, new.guide.id
        )));
    }
    if !new.tour.is_active {
        return Err(BookingError::Validation("tour is not available for booking".to_string()));
    }

    let now = env.clock.now();
    if new.date <= now {
        return Err(BookingError::Validation("tour date must be in the future".to_string()));
    }
    if new.number_of_people == 0 || new.number_of_people > new.tour.max_group_size {
        return Err(BookingError::Validation(format!(
            "number of people must be between 1 and {}",
            new.tour.max_group_size
        )));
    }
    let total_amount = new
        .tour
        .tour_fee
        .checked_multiply(new.number_of_people)
        .ok_or_else(|| BookingError::Validation("booking total is too large".to_string()))?;

    *state = Some(Booking {
        id: new.id,
        tourist_id: new.tourist.id,
        guide_id: new.guide.id,
        tour_id: new.tour.id,
        date: new.date,
        number_of_people: new.number_of_people,
        total_amount,
        status: BookingStatus::PendingPayment,
        payment_status: PaymentStatus::Pending,
        special_requests: new.special_requests,
        payment_reference: None,
        settlement: None,
        cancelled_by: None,
        created_at: now,
        paid_at: None,
        confirmed_at: None,
        completed_at: None,
        cancelled_at: None,
        version: Version::INITIAL,
    });

    Ok(smallvec![BookingEvent::Created {
        booking_id: new.id,
        total_amount,
    }])
}

fn mark_paid(
    booking: &mut Booking,
    reference: PaymentReference,
    amount: Option<Money>,
    env: &BookingEnvironment,
) -> Result<Events, BookingError> {
    if let Some(amount) = amount.filter(|amount| *amount != booking.total_amount) {
        return Err(BookingError::Validation(format!(
            "payment of {} cents does not match booking total of {} cents",
            amount.cents(),
            booking.total_amount.cents()
        )));
    }
    // Webhooks are delivered at least once; the same charge twice is a no-op.
    if booking.payment_reference.as_ref() == Some(&reference) {
        return Ok(SmallVec::new());
    }
    if booking.status != BookingStatus::PendingPayment {
        return Err(BookingError::InvalidState(format!(
            "booking is {} and is not awaiting payment",
            booking.status
        )));
    }
    ensure_transition(booking, BookingStatus::Pending)?;

    booking.status = BookingStatus::Pending;
    booking.payment_status = PaymentStatus::Paid;
    booking.payment_reference = Some(reference.clone());
    booking.paid_at = Some(env.clock.now());

    Ok(smallvec![BookingEvent::Paid {
        booking_id: booking.id,
        reference,
    }])
}

fn guide_decision(
    booking: &mut Booking,
    actor: Actor,
    decision: Decision,
    env: &BookingEnvironment,
) -> Result<Events, BookingError> {
    if actor.id != booking.guide_id {
        return Err(BookingError::Forbidden(
            "only the booking's guide can accept or decline it".to_string(),
        ));
    }
    if booking.status != BookingStatus::Pending {
        return Err(BookingError::InvalidState(format!(
            "booking is {} and is not awaiting a decision",
            booking.status
        )));
    }

    let now = env.clock.now();
    match decision {
        Decision::Accept => {
            ensure_transition(booking, BookingStatus::Confirmed)?;
            booking.status = BookingStatus::Confirmed;
            booking.confirmed_at = Some(now);
            Ok(smallvec![BookingEvent::Confirmed {
                booking_id: booking.id,
            }])
        },
        Decision::Decline => {
            ensure_transition(booking, BookingStatus::Cancelled)?;
            let settlement = env.policy.settle(
                booking.total_amount,
                CancelledBy::Guide,
                booking.time_until_tour(now),
            );
            booking.status = BookingStatus::Cancelled;
            booking.cancelled_by = Some(CancelledBy::Guide);
            booking.cancelled_at = Some(now);
            if !settlement.refund_amount.is_zero() {
                booking.payment_status = PaymentStatus::Refunded;
            }
            booking.settlement = Some(settlement);
            Ok(smallvec![BookingEvent::Declined {
                booking_id: booking.id,
                settlement,
            }])
        },
    }
}

fn cancel(
    booking: &mut Booking,
    actor: Actor,
    env: &BookingEnvironment,
) -> Result<Events, BookingError> {
    let cancelled_by = if actor.is_admin() {
        CancelledBy::ForceMajeure
    } else if actor.id == booking.tourist_id {
        CancelledBy::Tourist
    } else if actor.id == booking.guide_id {
        CancelledBy::Guide
    } else {
        return Err(BookingError::Forbidden(
            "only the booking's tourist, its guide or an admin can cancel it".to_string(),
        ));
    };

    if booking.status.is_terminal() {
        return Err(BookingError::InvalidState(format!(
            "booking is already {}",
            booking.status
        )));
    }
    if booking.status == BookingStatus::PendingPayment && cancelled_by != CancelledBy::ForceMajeure {
        return Err(BookingError::InvalidState(
            "booking is awaiting payment and cannot be cancelled yet".to_string(),
        ));
    }
    ensure_transition(booking, BookingStatus::Cancelled)?;

    let now = env.clock.now();
    let settlement = (booking.payment_status == PaymentStatus::Paid).then(|| {
        env.policy
            .settle(booking.total_amount, cancelled_by, booking.time_until_tour(now))
    });

    booking.status = BookingStatus::Cancelled;
    booking.cancelled_by = Some(cancelled_by);
    booking.cancelled_at = Some(now);
    if settlement.is_some_and(|s| !s.refund_amount.is_zero()) {
        booking.payment_status = PaymentStatus::Refunded;
    }
    booking.settlement = settlement;

    Ok(smallvec![BookingEvent::Cancelled {
        booking_id: booking.id,
        cancelled_by,
        settlement,
    }])
}

fn complete(booking: &mut Booking, env: &BookingEnvironment) -> Result<Events, BookingError> {
    if booking.status == BookingStatus::Completed {
        return Ok(SmallVec::new());
    }
    ensure_transition(booking, BookingStatus::Completed)?;

    let now = env.clock.now();
    if booking.date > now {
        return Err(BookingError::InvalidState(
            "tour has not taken place yet".to_string(),
        ));
    }
    if booking.payment_status != PaymentStatus::Paid {
        return Err(BookingError::InvalidState(format!(
            "payment is {} and the booking cannot be completed",
            booking.payment_status
        )));
    }

    let settlement = env.policy.settle_completion(booking.total_amount);
    booking.status = BookingStatus::Completed;
    booking.completed_at = Some(now);
    booking.settlement = Some(settlement);

    Ok(smallvec![BookingEvent::Completed {
        booking_id: booking.id,
        settlement,
    }])
}
