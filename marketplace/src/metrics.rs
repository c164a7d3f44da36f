//! Business metrics for the marketplace.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `tourbook_bookings_created_total` - Bookings created
//! - `tourbook_booking_transitions_total{to}` - Status transitions by target status
//! - `tourbook_refunds_cents_total` - Refunds settled, in cents
//! - `tourbook_commission_cents_total` - Commission settled at completion, in cents
//! - `tourbook_payment_replays_total` - Duplicate payment webhooks absorbed
//! - `tourbook_write_conflicts_total{operation}` - Lost optimistic-concurrency races
//! - `tourbook_sweep_completed_total` - Bookings completed by the sweeper
//!
//! ## Histograms
//! - `tourbook_stats_duration_seconds` - Time to build a platform statistics snapshot

use crate::types::{BookingStatus, Money};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Register all metric descriptions.
///
/// Call once at startup, before any metric is recorded.
pub fn register_metrics() {
    describe_counter!("tourbook_bookings_created_total", "Total number of bookings created");
    describe_counter!(
        "tourbook_booking_transitions_total",
        "Booking status transitions by target status"
    );
    describe_counter!("tourbook_refunds_cents_total", "Total refunds settled in cents");
    describe_counter!(
        "tourbook_commission_cents_total",
        "Total platform commission settled in cents"
    );
    describe_counter!(
        "tourbook_payment_replays_total",
        "Payment confirmations that repeated an already recorded reference"
    );
    describe_counter!(
        "tourbook_write_conflicts_total",
        "Booking writes rejected because another writer got there first"
    );
    describe_counter!(
        "tourbook_sweep_completed_total",
        "Bookings completed by the scheduled sweep"
    );
    describe_histogram!(
        "tourbook_stats_duration_seconds",
        "Time taken to build a platform statistics snapshot"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must run inside a Tokio runtime.
///
/// # Errors
///
/// Returns [`BuildError`] if the exporter cannot be built or a recorder is already installed.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .install()?;

    register_metrics();
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a booking created.
pub fn record_booking_created(total: Money) {
    metrics::counter!("tourbook_bookings_created_total").increment(1);
    tracing::debug!(total_cents = total.cents(), "Recorded booking_created metric");
}

/// Record a status transition.
pub fn record_transition(to: BookingStatus) {
    metrics::counter!("tourbook_booking_transitions_total", "to" => to.as_str()).increment(1);
}

/// Record a refund settled on cancellation.
pub fn record_refund(amount: Money) {
    if !amount.is_zero() {
        metrics::counter!("tourbook_refunds_cents_total").increment(amount.cents());
    }
}

/// Record commission settled on completion.
pub fn record_commission(amount: Money) {
    metrics::counter!("tourbook_commission_cents_total").increment(amount.cents());
}

/// Record a duplicate payment confirmation.
pub fn record_payment_replay() {
    metrics::counter!("tourbook_payment_replays_total").increment(1);
}

/// Record a lost write race.
pub fn record_write_conflict(operation: &'static str) {
    metrics::counter!("tourbook_write_conflicts_total", "operation" => operation).increment(1);
}

/// Record bookings completed by one sweep.
pub fn record_sweep_completed(count: usize) {
    metrics::counter!("tourbook_sweep_completed_total").increment(count as u64);
}

/// Record how long a statistics snapshot took.
pub fn record_stats_duration(elapsed: Duration) {
    metrics::histogram!("tourbook_stats_duration_seconds").record(elapsed.as_secs_f64());
}
