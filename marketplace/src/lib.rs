//! Tour booking marketplace.
//!
//! Tourists book tours offered by guides, pay through an external provider, and either
//! take the tour or cancel. Every booking moves through one state machine and every
//! cancellation or completion ends in a settlement that splits the money between the
//! tourist (refund), the guide (payout) and the platform (commission).
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)                           Background
//! ┌──────────────┐  ┌──────────────┐    ┌──────────────┐
//! │   Bookings   │  │    Admin     │    │   Sweeper    │
//! │   + webhook  │  │  stats/users │    │ (completion) │
//! └──────┬───────┘  └──────┬───────┘    └──────┬───────┘
//!        │                 │                   │
//!        ▼                 ▼                   ▼
//! ┌──────────────┐  ┌──────────────┐    ┌──────────────┐
//! │   Booking    │  │   Platform   │    │   Booking    │
//! │   Service    │  │  Aggregator  │    │   Service    │
//! └──────┬───────┘  └──────┬───────┘    └──────┬───────┘
//!        │  reducer +      │ read-only         │
//!        │  settlement     │ aggregates        │
//!        └────────────────►│◄──────────────────┘
//!                    ┌─────┴──────┐
//!                    │   Ledger   │  memory | PostgreSQL
//!                    └────────────┘
//! ```
//!
//! # Booking lifecycle
//!
//! ```text
//! pending_payment ──paid──► pending ──accept──► confirmed ──tour date passed──► completed
//!        │                     │                    │
//!        └──────(admin)────────┴──decline/cancel────┴──cancel──► cancelled
//! ```
//!
//! `cancelled` and `completed` are terminal. Writes are conditional on the version that
//! was read, so two concurrent transitions of one booking never both succeed.

pub mod api;
pub mod booking;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod server;
pub mod settlement;
pub mod stats;
pub mod sweeper;
pub mod types;

pub use booking::{
    BookingAction, BookingEnvironment, BookingError, BookingEvent, BookingReducer,
    BookingService, CreateBooking, SweepReport,
};
pub use config::Config;
pub use identity::{AuthError, IdentityProvider, JwtIdentityProvider, StaticIdentityProvider};
pub use ledger::{InMemoryLedger, LedgerAggregates, LedgerStore, PostgresLedger};
pub use server::{build_router, AppState};
pub use settlement::{CancelledBy, Settlement, SettlementPolicy};
pub use stats::{PlatformAggregator, PlatformStats, StatsError};
pub use types::{
    Actor, Booking, BookingId, BookingStatus, Decision, Money, PaymentStatus, Role, Tour,
    TourId, User, UserId,
};
