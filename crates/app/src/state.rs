//! Application state management

use std::sync::Arc;

use boxoffice_core::{
    Config, Database, MockPaymentGateway, PaymentGateway, Result, SharedStore, SystemClock,
};
use boxoffice_net::Services;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main application state
pub struct AppState {
    pub config: Config,
    pub services: Arc<Services>,
    refund_worker: JoinHandle<()>,
}

impl AppState {
    /// Open the configured database and wire the services over it
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.database_path()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        info!(path = %db_path.display(), version = db.schema_version(), "Database ready");
        Self::with_database(config, db)
    }

    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let policy = config.booking_policy()?;
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway::new(
            config.payment_latency(),
            config.payment.decline_rate,
        ));
        let (services, refund_worker) = Services::new(
            SharedStore::new(db),
            gateway,
            Arc::new(SystemClock),
            policy,
            config.refunds.queue_capacity,
        );

        Ok(Self {
            config,
            services: Arc::new(services),
            refund_worker,
        })
    }

    /// Finish queued refunds, then stop the worker
    pub async fn shutdown(self) {
        let refunds = self.services.bookings.refunds();
        if let Err(e) = refunds.flush().await {
            warn!(error = %e, "Could not flush refund queue");
        }
        let stats = refunds.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            dropped = stats.dropped,
            "Refund queue drained"
        );
        self.refund_worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_database_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("boxoffice.db");
        let config = Config {
            database_path: Some(db_path.clone()),
            ..Config::default()
        };

        let state = AppState::new(config).unwrap();
        assert!(db_path.exists());
        assert_eq!(state.services.bookings.policy(), Config::default().booking_policy().unwrap());

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_queue() {
        let config = Config::default();
        let state = AppState::with_database(config, Database::open_in_memory().unwrap()).unwrap();
        let stats = state.services.bookings.refunds().stats();
        assert_eq!((stats.completed, stats.failed, stats.dropped), (0, 0, 0));
        state.shutdown().await;
    }
}
