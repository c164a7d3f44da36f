//! Application state for the marketplace HTTP server.
//!
//! Everything is behind an `Arc`, so cloning per request is cheap.

use crate::booking::BookingService;
use crate::identity::IdentityProvider;
use crate::ledger::LedgerStore;
use crate::stats::PlatformAggregator;
use axum::extract::FromRef;
use std::sync::Arc;
use tourbook_core::BoxFuture;
use tourbook_web::ReadinessProbe;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Booking lifecycle
    pub bookings: Arc<BookingService>,

    /// Admin statistics
    pub stats: Arc<PlatformAggregator>,

    /// Direct ledger access for admin account updates
    pub ledger: Arc<dyn LedgerStore>,

    /// Bearer credential verification
    pub identity: Arc<dyn IdentityProvider>,

    /// Shared secret for payment webhook signatures
    pub webhook_secret: Arc<[u8]>,

    /// Backs `GET /ready`
    pub readiness: Arc<dyn ReadinessProbe>,
}

impl AppState {
    /// Create the state. Readiness pings `ledger`.
    #[must_use]
    pub fn new(
        bookings: Arc<BookingService>,
        stats: Arc<PlatformAggregator>,
        ledger: Arc<dyn LedgerStore>,
        identity: Arc<dyn IdentityProvider>,
        webhook_secret: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            readiness: Arc::new(LedgerProbe::new(ledger.clone())),
            bookings,
            stats,
            ledger,
            identity,
            webhook_secret: Arc::from(webhook_secret.as_ref()),
        }
    }
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ReadinessProbe> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.readiness.clone()
    }
}

/// Readiness probe that pings the ledger.
#[derive(Clone)]
pub struct LedgerProbe {
    ledger: Arc<dyn LedgerStore>,
}

impl LedgerProbe {
    /// Probe `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

impl ReadinessProbe for LedgerProbe {
    fn component(&self) -> &'static str {
        "ledger"
    }

    fn check(&self) -> BoxFuture<'_, Result<(), String>> {
        Box::pin(async move { self.ledger.ping().await.map_err(|e| e.to_string()) })
    }
}
