//! Hostel payment service
//!
//! Serves the payment, resident and calendar-year API over HTTP.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hostel_core::{BillingPolicy, Database, DisabledNotifier, Notifier};
use hostel_net::{HttpMailer, PaystackClient};

mod config;
mod error;
mod extract;
mod routes;
mod state;

use config::Config;
use state::AppState;

fn main() {
    let loaded = Config::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = loaded
            .as_ref()
            .ok()
            .and_then(|c| c.log.filter.clone())
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::new(directive)
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    info!("Starting hostel service");

    // Blocking HTTP clients are built before the runtime starts
    let app_state = match build_state(&config) {
        Ok(state) => state,
        Err(e) => exit_with(e),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => exit_with(e),
    };

    // blocking HTTP clients must be dropped outside the runtime
    let _collaborators = app_state.clone();
    if let Err(e) = runtime.block_on(serve(config, app_state)) {
        exit_with(e);
    }
}

fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)?;
    info!(path = %db_path.display(), version = db.schema_version(), "Database ready");
    drop(db);

    let gateway = PaystackClient::new(config.paystack()?)?;
    let notifier: Arc<dyn Notifier> = match config.mail() {
        Some(mail) => Arc::new(HttpMailer::new(mail)?),
        None => {
            warn!("No mail API key configured, access code emails are disabled");
            Arc::new(DisabledNotifier)
        }
    };
    let policy = BillingPolicy::new(config.billing.minimum_deposit_ratio)?;

    Ok(AppState::new(db_path, Arc::new(gateway), notifier, policy))
}

async fn serve(config: Config, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!(addr = %config.server.listen_addr, "Listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn exit_with(e: impl std::fmt::Display) -> ! {
    error!("Failed to start: {}", e);
    std::process::exit(1);
}
