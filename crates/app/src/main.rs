//! Boxoffice - event booking service
//!
//! Serves the booking, catalog and reporting operations over TCP.

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice_core::Config;
use boxoffice_net::Server;

mod state;

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "BOXOFFICE_CONFIG";

/// First CLI argument, else `$BOXOFFICE_CONFIG`
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Boxoffice");

    let config = match Config::load_or_default(config_path().as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match state::AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::start(app_state.config.listen_port, app_state.services.clone()).await
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    server.shutdown();
    app_state.shutdown().await;
}
