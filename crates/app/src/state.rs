//! Shared application state

use std::path::PathBuf;
use std::sync::Arc;

use hostel_core::{BillingPolicy, Database, Ledger, Notifier, PaymentGateway};

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    /// Migrated database file; every request opens its own connection
    pub db_path: Arc<PathBuf>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub policy: BillingPolicy,
}

impl AppState {
    pub fn new(
        db_path: PathBuf,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            db_path: Arc::new(db_path),
            gateway,
            notifier,
            policy,
        }
    }

    /// Run a blocking core operation on the blocking pool over a fresh
    /// connection and a ledger bound to the configured collaborators.
    ///
    /// Requests do not share a lock; writers serialize in SQLite through
    /// IMMEDIATE transactions, so outbound gateway calls never hold up
    /// other requests.
    pub async fn run<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database, &Ledger<'_>) -> hostel_core::Result<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = Database::connect(state.db_path.as_path())?;
            let ledger = Ledger::new(state.gateway.as_ref(), state.notifier.as_ref(), state.policy);
            f(&mut db, &ledger).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    }
}
