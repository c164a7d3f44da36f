//! Domain types for the tour booking marketplace.
//!
//! Identifiers, money, roles and the three records the booking core works with:
//! [`User`], [`Tour`] and [`Booking`]. The legal status transitions of a booking live here
//! too, in [`BookingStatus::can_transition_to`], so that every caller consults the same table.

use crate::settlement::{CancelledBy, Settlement};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tourbook_core::Version;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a user (tourist, guide or admin)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a tour listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TourId(Uuid);

impl TourId {
    /// Creates a new random `TourId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TourId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TourId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking, generated on creation and never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// An amount of money in minor currency units (cents).
///
/// Serializes as a bare integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts, flooring at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// `percent`% of this amount, rounded half up to the nearest cent.
    ///
    /// Percentages above 100 are clamped to 100, so the result never exceeds `self`.
    #[must_use]
    pub fn percent(self, percent: u32) -> Self {
        let percent = u128::from(percent.min(100));
        let scaled = (u128::from(self.0) * percent + 50) / 100;
        // percent <= 100, so scaled <= self.0 and always fits.
        Self(u64::try_from(scaled).unwrap_or(self.0))
    }

    /// Divide evenly into `parts`, rounded half up. Zero parts yields zero.
    #[must_use]
    pub const fn average_over(self, parts: u64) -> Self {
        if parts == 0 {
            return Self::ZERO;
        }
        let round_up = self.0 % parts >= parts - parts / 2;
        Self(self.0 / parts + round_up as u64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|m| m.0).fold(0, u64::saturating_add))
    }
}

// ============================================================================
// Roles and actors
// ============================================================================

/// A stored enum value did not match any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// What a user is allowed to do on the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books tours.
    Tourist,
    /// Offers tours and accepts or declines bookings.
    Guide,
    /// Moderates users and reads platform statistics.
    Admin,
}

impl Role {
    /// Stable lowercase name, as stored and as carried in tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tourist => "tourist",
            Self::Guide => "guide",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tourist" => Ok(Self::Tourist),
            "guide" => Ok(Self::Guide),
            "admin" => Ok(Self::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// The authenticated party performing an operation.
///
/// Every operation that depends on who is asking takes an `Actor` explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The user's id.
    pub id: UserId,
    /// The user's role at authentication time.
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// A tourist actor.
    #[must_use]
    pub const fn tourist(id: UserId) -> Self {
        Self::new(id, Role::Tourist)
    }

    /// A guide actor.
    #[must_use]
    pub const fn guide(id: UserId) -> Self {
        Self::new(id, Role::Guide)
    }

    /// An admin actor.
    #[must_use]
    pub const fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }

    /// True for admins.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

// ============================================================================
// Users and tours
// ============================================================================

/// A registered user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Role; only an admin may change it after creation
    pub role: Role,
    /// Guide day rate (guides only)
    pub daily_rate: Option<Money>,
    /// Average review score (guides only)
    pub rating: Option<f32>,
    /// Number of reviews behind `rating`
    pub reviews_count: u32,
    /// Set by an admin once the guide's identity is checked
    pub is_verified: bool,
    /// Cleared by an admin to suspend the account
    pub is_active: bool,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A new active, unverified user with no guide profile.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            role,
            daily_rate: None,
            rating: None,
            reviews_count: 0,
            is_verified: false,
            is_active: true,
            created_at,
        }
    }
}

/// Admin-controlled account flags.
///
/// `None` leaves the flag unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFlags {
    /// New `is_active` value
    #[serde(default)]
    pub is_active: Option<bool>,
    /// New `is_verified` value
    #[serde(default)]
    pub is_verified: Option<bool>,
}

impl UserFlags {
    /// True when no flag would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.is_verified.is_none()
    }

    /// Apply to a user record.
    pub fn apply(&self, user: &mut User) {
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(verified) = self.is_verified {
            user.is_verified = verified;
        }
    }
}

/// A bookable experience offered by one guide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    /// Identifier
    pub id: TourId,
    /// The guide who owns this tour
    pub guide_id: UserId,
    /// Listing title
    pub title: String,
    /// Price per person
    pub tour_fee: Money,
    /// Length of the tour
    pub duration_hours: u32,
    /// Largest group the guide accepts
    pub max_group_size: u32,
    /// Inactive tours are hidden and cannot be booked; existing bookings are unaffected
    pub is_active: bool,
    /// Listing time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Booking
// ============================================================================

/// Where a booking is in its lifecycle.
///
/// ```text
/// pending_payment ──paid──▶ pending ──accept──▶ confirmed ──tour date passed──▶ completed
///        │                     │                    │
///        └──────────────┬──────┴─────────┬──────────┘
///                       ▼                ▼
///                           cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, waiting for the payment provider
    PendingPayment,
    /// Paid, waiting for the guide's decision
    Pending,
    /// Accepted by the guide
    Confirmed,
    /// The tour took place (terminal)
    Completed,
    /// Cancelled or declined (terminal)
    Cancelled,
}

impl BookingStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::PendingPayment,
        Self::Pending,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    /// The transition table.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingPayment, Self::Pending | Self::Cancelled)
                | (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
        )
    }

    /// `completed` and `cancelled` never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("booking status", s))
    }
}

/// Payment state, tracked independently of [`BookingStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment received yet
    Pending,
    /// Payment confirmed by the provider
    Paid,
    /// Some or all of the payment was returned
    Refunded,
}

impl PaymentStatus {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// The payment provider's reference for a charge; deduplicates webhook deliveries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Wrap a provider reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A guide's answer to a paid booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Confirm the booking
    Accept,
    /// Refuse it; the tourist is refunded in full
    Decline,
}

/// A tourist's booking of a tour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Identifier
    pub id: BookingId,
    /// Who booked
    pub tourist_id: UserId,
    /// Who guides
    pub guide_id: UserId,
    /// What was booked
    pub tour_id: TourId,
    /// When the tour takes place
    pub date: DateTime<Utc>,
    /// Group size
    pub number_of_people: u32,
    /// `tour_fee × number_of_people`, frozen at creation
    pub total_amount: Money,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Free-text notes from the tourist
    pub special_requests: Option<String>,
    /// Provider reference recorded when payment arrived
    pub payment_reference: Option<PaymentReference>,
    /// Money split, attached at cancellation of a paid booking or at completion
    pub settlement: Option<Settlement>,
    /// Who cancelled, when cancelled
    pub cancelled_by: Option<CancelledBy>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When payment arrived
    pub paid_at: Option<DateTime<Utc>>,
    /// When the guide accepted
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the booking was completed
    pub completed_at: Option<DateTime<Utc>>,
    /// When the booking was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version
    pub version: Version,
}

impl Booking {
    /// True when the actor is this booking's tourist or guide.
    #[must_use]
    pub fn is_participant(&self, actor: &Actor) -> bool {
        actor.id == self.tourist_id || actor.id == self.guide_id
    }

    /// Time left until the tour starts; negative once it has started.
    #[must_use]
    pub fn time_until_tour(&self, now: DateTime<Utc>) -> Duration {
        self.date - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use BookingStatus::{Cancelled, Completed, Confirmed, Pending, PendingPayment};

        let allowed = [
            (PendingPayment, Pending),
            (PendingPayment, Cancelled),
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];

        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for from in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(BookingStatus::ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn status_names_round_trip() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert!("shipped".parse::<BookingStatus>().is_err());
        assert_eq!("guide".parse::<Role>(), Ok(Role::Guide));
        assert_eq!("refunded".parse::<PaymentStatus>(), Ok(PaymentStatus::Refunded));
    }

    #[test]
    fn money_percent_rounds_half_up() {
        assert_eq!(Money::from_cents(200).percent(15), Money::from_cents(30));
        assert_eq!(Money::from_cents(10).percent(15), Money::from_cents(2)); // 1.5 -> 2
        assert_eq!(Money::from_cents(9).percent(50), Money::from_cents(5)); // 4.5 -> 5
        assert_eq!(Money::from_cents(3).percent(15), Money::ZERO); // 0.45 -> 0
        assert_eq!(Money::from_cents(100).percent(250), Money::from_cents(100));
        assert_eq!(Money::from_cents(u64::MAX).percent(100), Money::from_cents(u64::MAX));
    }

    #[test]
    fn money_average() {
        assert_eq!(Money::from_cents(1000).average_over(0), Money::ZERO);
        assert_eq!(Money::from_cents(1000).average_over(3), Money::from_cents(333));
        assert_eq!(Money::from_cents(500).average_over(3), Money::from_cents(167));
        assert_eq!(Money::from_cents(5).average_over(2), Money::from_cents(3));
    }

    #[test]
    fn money_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Money::from_cents(1999)).ok(), Some("1999".to_string()));
        assert_eq!(Money::from_cents(1999).to_string(), "19.99");
    }

    #[test]
    fn participant_check() {
        let tourist = UserId::new();
        let guide = UserId::new();
        let now = Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            tourist_id: tourist,
            guide_id: guide,
            tour_id: TourId::new(),
            date: now + Duration::days(3),
            number_of_people: 1,
            total_amount: Money::from_cents(100),
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            special_requests: None,
            payment_reference: None,
            settlement: None,
            cancelled_by: None,
            created_at: now,
            paid_at: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            version: Version::INITIAL,
        };

        assert!(booking.is_participant(&Actor::tourist(tourist)));
        assert!(booking.is_participant(&Actor::guide(guide)));
        assert!(!booking.is_participant(&Actor::admin(UserId::new())));
        assert_eq!(booking.time_until_tour(now), Duration::days(3));
    }
}
