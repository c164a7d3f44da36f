//! Scheduled completion of bookings whose tour has taken place.
//!
//! The sweeper calls [`BookingService::sweep_due`] on a fixed interval until it is told
//! to stop. Sweeps never overlap within one process; across replicas, the ledger's
//! versioned writes make concurrent sweeps safe.

use crate::booking::BookingService;
use crate::config::SweepConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for the current sweep to finish.
    pub async fn shutdown(self) {
        self.shutdown.send(true).ok();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Sweeper task failed");
        }
    }
}

/// Start sweeping every `config.interval_secs` seconds.
///
/// Returns `None` when the interval is zero (sweeper disabled). Must run inside a Tokio
/// runtime.
#[must_use]
pub fn spawn(bookings: Arc<BookingService>, config: SweepConfig) -> Option<SweeperHandle> {
    if config.interval_secs == 0 {
        tracing::info!("Completion sweeper disabled");
        return None;
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let period = Duration::from_secs(config.interval_secs);
    let batch_size = config.batch_size.max(1);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), batch_size, "Completion sweeper started");

        while !*shutdown_rx.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = bookings.sweep_due(batch_size).await {
                        tracing::warn!(error = %e, "Completion sweep failed");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Completion sweeper stopped");
    });

    Some(SweeperHandle {
        shutdown: shutdown_tx,
        task,
    })
}
