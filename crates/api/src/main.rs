//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::auth::{Authenticator, TrustedHeaderAuthenticator};
use api::config::Config;
use checkout::StripeGateway;
use store::PostgresStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;
    tracing::debug!(?config, "configuration loaded");

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let pool = api::db::connect_with_retry(&config).await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("database migrations applied");

    let gateway = StripeGateway::new(
        config.payment_secret_key.clone(),
        config.payment_api_base.clone(),
        config.checkout_return_url.clone(),
    )?;

    let state = Arc::new(AppState::new(store.clone(), gateway, config.currency.clone()));
    let authenticator: Arc<dyn Authenticator> = Arc::new(TrustedHeaderAuthenticator);
    let app = api::create_app(state, authenticator, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.pool().close().await;
    tracing::info!("server shut down gracefully");
    Ok(())
}
