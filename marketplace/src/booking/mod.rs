//! The booking lifecycle.
//!
//! - [`BookingReducer`]: pure state machine over one booking
//! - [`BookingService`]: loads records, runs the reducer, writes back conditionally
//! - [`BookingNotifier`]: where accepted events go after a successful write

mod reducer;
mod service;

pub use reducer::BookingReducer;
pub use service::{
    BookingNotifier, BookingService, CreateBooking, LogNotifier, SweepReport,
};

use crate::settlement::{CancelledBy, Settlement, SettlementPolicy};
use crate::types::{
    Actor, BookingId, BookingStatus, Decision, Money, PaymentReference, Tour, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tourbook_core::environment::Clock;
use tourbook_core::StoreError;

/// Everything the reducer needs to decide whether a booking may be created.
///
/// The referenced users and tour are loaded by the caller; the reducer only judges them.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBooking {
    /// Id for the booking to create
    pub id: BookingId,
    /// Who is asking
    pub actor: Actor,
    /// The tourist's user record
    pub tourist: User,
    /// The guide's user record
    pub guide: User,
    /// The tour being booked
    pub tour: Tour,
    /// When the tour takes place
    pub date: DateTime<Utc>,
    /// Group size
    pub number_of_people: u32,
    /// Optional notes
    pub special_requests: Option<String>,
}

/// Inputs to the booking state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum BookingAction {
    /// Create a booking awaiting payment
    Create(Box<NewBooking>),
    /// The payment provider confirmed a charge
    MarkPaid {
        /// Provider reference for the charge
        reference: PaymentReference,
        /// Amount the provider charged, when it reports one
        amount: Option<Money>,
    },
    /// The guide accepts or declines
    GuideDecision {
        /// Who is deciding
        actor: Actor,
        /// Accept or decline
        decision: Decision,
    },
    /// A participant or an admin cancels
    Cancel {
        /// Who is cancelling
        actor: Actor,
    },
    /// The tour took place (scheduler)
    Complete,
}

impl BookingAction {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::MarkPaid { .. } => "mark_paid",
            Self::GuideDecision { .. } => "guide_decision",
            Self::Cancel { .. } => "cancel",
            Self::Complete => "complete",
        }
    }
}

/// Facts emitted when the state machine accepts an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A booking was created in `pending_payment`
    Created {
        /// Booking id
        booking_id: BookingId,
        /// Frozen total
        total_amount: Money,
    },
    /// Payment arrived; the booking waits for the guide
    Paid {
        /// Booking id
        booking_id: BookingId,
        /// Provider reference
        reference: PaymentReference,
    },
    /// The guide accepted
    Confirmed {
        /// Booking id
        booking_id: BookingId,
    },
    /// The guide declined; the tourist is refunded in full
    Declined {
        /// Booking id
        booking_id: BookingId,
        /// Full-refund settlement
        settlement: Settlement,
    },
    /// Cancelled by a participant or an admin
    Cancelled {
        /// Booking id
        booking_id: BookingId,
        /// Who cancelled
        cancelled_by: CancelledBy,
        /// Absent when nothing had been paid
        settlement: Option<Settlement>,
    },
    /// The tour took place; commission taken
    Completed {
        /// Booking id
        booking_id: BookingId,
        /// Completion settlement
        settlement: Settlement,
    },
}

impl BookingEvent {
    /// The status the booking is in after this event.
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        match self {
            Self::Created { .. } => BookingStatus::PendingPayment,
            Self::Paid { .. } => BookingStatus::Pending,
            Self::Confirmed { .. } => BookingStatus::Confirmed,
            Self::Declined { .. } | Self::Cancelled { .. } => BookingStatus::Cancelled,
            Self::Completed { .. } => BookingStatus::Completed,
        }
    }

    /// The settlement this event attached, if any.
    #[must_use]
    pub const fn settlement(&self) -> Option<&Settlement> {
        match self {
            Self::Declined { settlement, .. } | Self::Completed { settlement, .. } => Some(settlement),
            Self::Cancelled { settlement, .. } => settlement.as_ref(),
            Self::Created { .. } | Self::Paid { .. } | Self::Confirmed { .. } => None,
        }
    }
}

/// Why a booking operation was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// The actor may not perform this operation on this booking
    #[error("{0}")]
    Forbidden(String),

    /// The operation is not legal from the booking's current status
    #[error("{0}")]
    InvalidState(String),

    /// A referenced record does not exist
    #[error("{kind} with id {id} not found")]
    NotFound {
        /// Record kind (`booking`, `tour`, `user`)
        kind: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// The ledger failed
    #[error("ledger error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Shorthand for [`BookingError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returned to the loser of a concurrent write.
    #[must_use]
    pub fn lost_race() -> Self {
        Self::InvalidState("booking already updated by another request".to_string())
    }
}

/// Injected dependencies of the booking state machine.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Refund schedule and commission
    pub policy: SettlementPolicy,
}

impl BookingEnvironment {
    /// Create an environment.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, policy: SettlementPolicy) -> Self {
        Self { clock, policy }
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("now", &self.clock.now())
            .field("policy", &self.policy)
            .finish()
    }
}
