//! Tour booking marketplace server.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Starts the Prometheus exporter
//! - Opens the ledger (`PostgreSQL` with migrations, or in-memory)
//! - Starts the completion sweeper
//! - Serves the HTTP API until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! # In-memory ledger with demo data
//! LEDGER_SEED_DEMO=true cargo run --bin tourbook-server
//!
//! # PostgreSQL
//! LEDGER_BACKEND=postgres DATABASE_URL=postgres://... cargo run --bin tourbook-server
//! ```

use chrono::Duration as ChronoDuration;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tourbook_core::environment::{Clock, SystemClock};
use tourbook_marketplace::{
    booking::{BookingEnvironment, BookingService},
    config::{Config, LedgerBackend},
    identity::{issue_token, JwtIdentityProvider},
    ledger::{InMemoryLedger, LedgerAggregates, LedgerStore, PostgresLedger},
    metrics,
    server::{build_router, shutdown_signal, AppState},
    stats::PlatformAggregator,
    sweeper,
    types::{Actor, Role},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tour booking marketplace");
    info!(
        backend = ?config.ledger.backend,
        commission_percent = config.settlement.commission_percent,
        sweep_interval_secs = config.sweep.interval_secs,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config.metrics_addr().parse()?;
    metrics::install_prometheus(metrics_addr)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (ledger, aggregates) = open_ledger(&config, clock.as_ref()).await?;

    let env = BookingEnvironment::new(clock.clone(), config.settlement);
    let bookings = Arc::new(BookingService::new(ledger.clone(), env));
    let stats = Arc::new(
        PlatformAggregator::new(aggregates, clock)
            .with_policy(config.settlement)
            .with_series_months(config.stats.series_months),
    );
    let identity = Arc::new(JwtIdentityProvider::new(config.auth.jwt_secret.as_bytes()));

    let state = AppState::new(
        bookings.clone(),
        stats,
        ledger,
        identity,
        config.auth.webhook_secret.as_bytes(),
    );

    let sweeper = sweeper::spawn(bookings, config.sweep);

    let app = build_router(state);
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        let timeout = Duration::from_secs(config.server.shutdown_timeout);
        if tokio::time::timeout(timeout, sweeper.shutdown()).await.is_err() {
            warn!(timeout_secs = timeout.as_secs(), "Sweeper did not stop in time");
        }
    }

    info!("Server stopped");
    Ok(())
}

type Ledgers = (Arc<dyn LedgerStore>, Arc<dyn LedgerAggregates>);

async fn open_ledger(
    config: &Config,
    clock: &dyn Clock,
) -> Result<Ledgers, Box<dyn std::error::Error>> {
    match config.ledger.backend {
        LedgerBackend::Postgres => {
            info!("Connecting to PostgreSQL ledger...");
            let ledger = Arc::new(PostgresLedger::connect(&config.ledger.database).await?);
            ledger.migrate().await?;
            info!("PostgreSQL ledger ready");
            let store: Arc<dyn LedgerStore> = ledger.clone();
            let aggregates: Arc<dyn LedgerAggregates> = ledger;
            Ok((store, aggregates))
        },
        LedgerBackend::Memory => {
            warn!("Using the in-memory ledger; data is lost on restart");
            let ledger = Arc::new(InMemoryLedger::new());
            if config.ledger.seed_demo {
                let seed = ledger.seed_demo(clock.now())?;
                let expires_at = clock.now() + ChronoDuration::hours(24);
                let secret = config.auth.jwt_secret.as_bytes();
                for (label, id, role) in [
                    ("guide", seed.guide, Role::Guide),
                    ("tourist", seed.tourist, Role::Tourist),
                    ("admin", seed.admin, Role::Admin),
                ] {
                    let token = issue_token(secret, Actor::new(id, role), expires_at)?;
                    info!(user = label, user_id = %id, token = %token, "Demo user");
                }
                info!(tour_id = %seed.tour, guide_id = %seed.guide, "Demo tour");
            }
            let store: Arc<dyn LedgerStore> = ledger.clone();
            let aggregates: Arc<dyn LedgerAggregates> = ledger;
            Ok((store, aggregates))
        },
    }
}
