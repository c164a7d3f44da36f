//! Imperative shell around the booking reducer.
//!
//! Each operation loads the booking, runs [`BookingReducer`] on a copy and writes the
//! result back conditionally on the version it read. A lost race surfaces as
//! [`BookingError::lost_race`]; only `mark_paid` reloads and tries once more.

use super::{
    BookingAction, BookingEnvironment, BookingError, BookingEvent, BookingReducer, NewBooking,
};
use crate::ledger::LedgerStore;
use crate::metrics;
use crate::types::{
    Actor, Booking, BookingId, Decision, Money, PaymentReference, Role, TourId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tourbook_core::reducer::Reducer;
use tourbook_core::{BoxFuture, SmallVec, StoreError};

const MAX_SPECIAL_REQUESTS_CHARS: usize = 1000;
const MAX_PAYMENT_REFERENCE_CHARS: usize = 200;

/// Receives events after they have been durably written.
///
/// Delivery (email, push) is out of this crate's hands; a failing notifier is logged
/// and never undoes the write.
pub trait BookingNotifier: Send + Sync {
    /// Handle one accepted event.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be handed off.
    fn notify<'a>(
        &'a self,
        booking: &'a Booking,
        event: &'a BookingEvent,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Notifier that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl BookingNotifier for LogNotifier {
    fn notify<'a>(
        &'a self,
        booking: &'a Booking,
        event: &'a BookingEvent,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            tracing::info!(
                booking_id = %booking.id,
                tourist_id = %booking.tourist_id,
                guide_id = %booking.guide_id,
                event = ?event,
                "Booking notification"
            );
            Ok(())
        })
    }
}

/// Body of a booking request. The tourist is the authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBooking {
    /// The guide offering the tour
    pub guide_id: UserId,
    /// The tour to book
    pub tour_id: TourId,
    /// When the tour takes place
    pub date: DateTime<Utc>,
    /// Group size
    pub number_of_people: u32,
    /// Optional notes for the guide
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// Outcome of one completion sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Bookings moved to `completed`
    pub completed: usize,
    /// Bookings another writer changed first, or already completed
    pub skipped: usize,
    /// Bookings that could not be completed
    pub failed: usize,
}

struct Transition {
    booking: Booking,
    events: SmallVec<[BookingEvent; 4]>,
}

/// Booking lifecycle operations over a ledger.
#[derive(Clone)]
pub struct BookingService {
    ledger: Arc<dyn LedgerStore>,
    reducer: BookingReducer,
    env: BookingEnvironment,
    notifier: Arc<dyn BookingNotifier>,
}

impl BookingService {
    /// Create a service that logs events.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, env: BookingEnvironment) -> Self {
        Self {
            ledger,
            reducer: BookingReducer::new(),
            env,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replace the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn BookingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The environment the reducer runs with.
    #[must_use]
    pub const fn environment(&self) -> &BookingEnvironment {
        &self.env
    }

    /// Create a booking in `pending_payment` for the acting tourist.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`] if the actor is not an active tourist
    /// - [`BookingError::NotFound`] if the tourist, guide or tour does not exist
    /// - [`BookingError::Validation`] if the request breaks a booking rule
    /// - [`BookingError::Store`] if the ledger fails
    pub async fn create(&self, actor: Actor, request: CreateBooking) -> Result<Booking, BookingError> {
        if actor.role != Role::Tourist {
            return Err(BookingError::Forbidden("only tourists can book tours".to_string()));
        }
        let special_requests = normalize_special_requests(request.special_requests)?;

        let (tourist, guide, tour) = futures::try_join!(
            self.ledger.get_user(actor.id),
            self.ledger.get_user(request.guide_id),
            self.ledger.get_tour(request.tour_id),
        )?;
        let tourist = tourist.ok_or_else(|| BookingError::not_found("user", actor.id))?;
        let guide = guide.ok_or_else(|| BookingError::not_found("guide", request.guide_id))?;
        let tour = tour.ok_or_else(|| BookingError::not_found("tour", request.tour_id))?;

        let mut state = None;
        let events = self.reducer.reduce(
            &mut state,
            BookingAction::Create(Box::new(NewBooking {
                id: BookingId::new(),
                actor,
                tourist,
                guide,
                tour,
                date: request.date,
                number_of_people: request.number_of_people,
                special_requests,
            })),
            &self.env,
        )?;
        let booking = state
            .ok_or_else(|| BookingError::InvalidState("booking was not created".to_string()))?;

        self.ledger.create_booking(booking.clone()).await?;

        metrics::record_booking_created(booking.total_amount);
        tracing::info!(
            booking_id = %booking.id,
            to = %booking.status,
            actor = %actor,
            total_cents = booking.total_amount.cents(),
            "Booking created"
        );
        self.publish(&booking, &events).await;
        Ok(booking)
    }

    /// Record a confirmed payment.
    ///
    /// Repeating the same reference returns the booking unchanged.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] if the reference is empty or too long
    /// - [`BookingError::NotFound`] if the booking does not exist
    /// - [`BookingError::InvalidState`] if the booking is not awaiting payment, or the
    ///   reference already paid for another booking
    pub async fn mark_paid(
        &self,
        booking_id: BookingId,
        reference: PaymentReference,
    ) -> Result<Booking, BookingError> {
        self.record_payment(booking_id, reference, None).await
    }

    /// Record a payment the provider reports together with the amount it charged.
    ///
    /// # Errors
    ///
    /// As [`mark_paid`](Self::mark_paid), plus [`BookingError::Validation`] if `amount`
    /// differs from the booking total.
    pub async fn confirm_payment(
        &self,
        booking_id: BookingId,
        reference: PaymentReference,
        amount: Money,
    ) -> Result<Booking, BookingError> {
        self.record_payment(booking_id, reference, Some(amount)).await
    }

    async fn record_payment(
        &self,
        booking_id: BookingId,
        reference: PaymentReference,
        amount: Option<Money>,
    ) -> Result<Booking, BookingError> {
        let trimmed = reference.as_str().trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_PAYMENT_REFERENCE_CHARS {
            return Err(BookingError::Validation(
                "payment reference must be 1 to 200 characters".to_string(),
            ));
        }
        let reference = PaymentReference::new(trimmed);
        let action = BookingAction::MarkPaid {
            reference: reference.clone(),
            amount,
        };

        let transition = match self.try_apply(booking_id, action.clone(), None).await {
            Err(BookingError::Store(err)) if err.is_conflict() => {
                tracing::debug!(booking_id = %booking_id, "Payment raced another write; reloading");
                self.try_apply(booking_id, action, None).await
            },
            other => other,
        }
        .map_err(|err| match err {
            BookingError::Store(StoreError::Duplicate(_)) => {
                tracing::warn!(
                    booking_id = %booking_id,
                    reference = %reference,
                    "Payment reference already settled another booking"
                );
                BookingError::InvalidState(
                    "payment reference already used by another booking".to_string(),
                )
            },
            other => lost_race(other, "mark_paid"),
        })?;

        if transition.events.is_empty() {
            metrics::record_payment_replay();
            tracing::info!(booking_id = %booking_id, "Payment confirmation replayed");
        }
        Ok(transition.booking)
    }

    /// The guide accepts or declines a paid booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`] if the actor is not the booking's guide
    /// - [`BookingError::InvalidState`] if the booking is not `pending`
    pub async fn guide_decision(
        &self,
        booking_id: BookingId,
        actor: Actor,
        decision: Decision,
    ) -> Result<Booking, BookingError> {
        self.try_apply(booking_id, BookingAction::GuideDecision { actor, decision }, Some(actor))
            .await
            .map(|t| t.booking)
            .map_err(|err| lost_race(err, "guide_decision"))
    }

    /// Cancel a booking on behalf of its tourist, its guide or an admin.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`] if the actor is not a participant or admin
    /// - [`BookingError::InvalidState`] if the booking cannot be cancelled from its status
    pub async fn cancel(&self, booking_id: BookingId, actor: Actor) -> Result<Booking, BookingError> {
        self.try_apply(booking_id, BookingAction::Cancel { actor }, Some(actor))
            .await
            .map(|t| t.booking)
            .map_err(|err| lost_race(err, "cancel"))
    }

    /// Complete a confirmed booking whose tour date has passed.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidState`] if the booking is not `confirmed` or the tour is ahead.
    pub async fn complete(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.try_apply(booking_id, BookingAction::Complete, None)
            .await
            .map(|t| t.booking)
            .map_err(|err| lost_race(err, "complete"))
    }

    /// Load a booking for one of its participants or an admin.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if the booking does not exist
    /// - [`BookingError::Forbidden`] if the actor may not see it
    pub async fn get(&self, booking_id: BookingId, actor: Actor) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        if actor.is_admin() || booking.is_participant(&actor) {
            Ok(booking)
        } else {
            Err(BookingError::Forbidden(
                "only the booking's tourist, its guide or an admin can view it".to_string(),
            ))
        }
    }

    /// Complete up to `limit` confirmed bookings whose tour date has passed.
    ///
    /// Each booking is written conditionally on the version that was read, so several
    /// replicas may sweep at once; whoever loses a race skips that booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::Store`] if the due bookings cannot be listed.
    pub async fn sweep_due(&self, limit: usize) -> Result<SweepReport, BookingError> {
        let now = self.env.clock.now();
        let due = self.ledger.due_for_completion(now, limit).await?;
        let mut report = SweepReport::default();

        for booking in due {
            let booking_id = booking.id;
            match self.apply_to(booking, BookingAction::Complete, None).await {
                Ok(transition) if transition.events.is_empty() => report.skipped += 1,
                Ok(_) => report.completed += 1,
                Err(BookingError::Store(err)) if err.is_conflict() => {
                    metrics::record_write_conflict("sweep");
                    tracing::debug!(booking_id = %booking_id, "Booking changed during sweep; skipped");
                    report.skipped += 1;
                },
                Err(err) => {
                    tracing::warn!(booking_id = %booking_id, error = %err, "Could not complete booking");
                    report.failed += 1;
                },
            }
        }

        metrics::record_sweep_completed(report.completed);
        if report != SweepReport::default() {
            tracing::info!(
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed,
                "Completion sweep finished"
            );
        }
        Ok(report)
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.ledger
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))
    }

    async fn try_apply(
        &self,
        booking_id: BookingId,
        action: BookingAction,
        actor: Option<Actor>,
    ) -> Result<Transition, BookingError> {
        let current = self.load(booking_id).await?;
        self.apply_to(current, action, actor).await
    }

    /// Reduce and write back. Conflicts are returned raw as `BookingError::Store`.
    async fn apply_to(
        &self,
        current: Booking,
        action: BookingAction,
        actor: Option<Actor>,
    ) -> Result<Transition, BookingError> {
        let from = current.status;
        let expected = current.version;
        let operation = action.name();

        let mut state = Some(current);
        let events = self.reducer.reduce(&mut state, action, &self.env)?;
        let booking = state
            .ok_or_else(|| BookingError::InvalidState("booking does not exist".to_string()))?;

        if events.is_empty() {
            return Ok(Transition { booking, events });
        }

        let stored = self.ledger.update_booking(booking, expected).await?;

        let who = actor.map_or_else(|| "system".to_string(), |a| a.to_string());
        tracing::info!(
            booking_id = %stored.id,
            from = %from,
            to = %stored.status,
            actor = %who,
            operation,
            "Booking transition"
        );
        record_event_metrics(&events);
        self.publish(&stored, &events).await;

        Ok(Transition {
            booking: stored,
            events,
        })
    }

    async fn publish(&self, booking: &Booking, events: &[BookingEvent]) {
        for event in events {
            if let Err(err) = self.notifier.notify(booking, event).await {
                tracing::warn!(booking_id = %booking.id, error = %err, "Booking notification failed");
            }
        }
    }
}

fn record_event_metrics(events: &[BookingEvent]) {
    for event in events {
        metrics::record_transition(event.status());
        match event {
            BookingEvent::Declined { settlement, .. } => metrics::record_refund(settlement.refund_amount),
            BookingEvent::Cancelled {
                settlement: Some(settlement),
                ..
            } => metrics::record_refund(settlement.refund_amount),
            BookingEvent::Completed { settlement, .. } => {
                metrics::record_commission(settlement.commission_amount);
            },
            _ => {},
        }
    }
}

fn lost_race(err: BookingError, operation: &'static str) -> BookingError {
    match err {
        BookingError::Store(store) if store.is_conflict() => {
            metrics::record_write_conflict(operation);
            tracing::info!(operation, error = %store, "Lost a write race");
            BookingError::lost_race()
        },
        other => other,
    }
}

fn normalize_special_requests(requests: Option<String>) -> Result<Option<String>, BookingError> {
    let Some(text) = requests else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text.chars().count() > MAX_SPECIAL_REQUESTS_CHARS {
        return Err(BookingError::Validation(format!(
            "special requests must be at most {MAX_SPECIAL_REQUESTS_CHARS} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn special_requests_are_trimmed() {
        assert_eq!(normalize_special_requests(None).unwrap(), None);
        assert_eq!(normalize_special_requests(Some("   ".to_string())).unwrap(), None);
        assert_eq!(
            normalize_special_requests(Some("  vegetarian lunch ".to_string())).unwrap(),
            Some("vegetarian lunch".to_string())
        );
        assert!(normalize_special_requests(Some("x".repeat(1001))).is_err());
    }

    #[test]
    fn conflict_becomes_lost_race() {
        let conflict = BookingError::Store(tourbook_core::StoreError::ConcurrencyConflict {
            record: "booking:1".to_string(),
            expected: tourbook_core::Version::new(1),
            actual: tourbook_core::Version::new(2),
        });
        assert_eq!(lost_race(conflict, "cancel"), BookingError::lost_race());

        let other = BookingError::Validation("bad".to_string());
        assert_eq!(lost_race(other.clone(), "cancel"), other);
    }

    #[test]
    fn create_request_accepts_missing_special_requests() {
        let json = serde_json::json!({
            "guide_id": uuid::Uuid::new_v4(),
            "tour_id": uuid::Uuid::new_v4(),
            "date": "2025-03-01T09:00:00Z",
            "number_of_people": 2
        });
        let request: CreateBooking = serde_json::from_value(json).unwrap();
        assert_eq!(request.special_requests, None);
        assert_eq!(request.number_of_people, 2);
    }
}
