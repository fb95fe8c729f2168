mod app;
mod config;
mod db;
mod handler;
mod models;
mod schema;
mod storage;

use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::{create_app, AppState},
    config::Cli,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "posts_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = init_state(&cli)?;
    let app = create_app(state);

    let listener = TcpListener::bind(cli.bind_addr()).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(not(feature = "inmemory"))]
fn init_state(cli: &Cli) -> Result<AppState> {
    use crate::storage::postgres::PgStorage;

    let pool = db::get_connection_pool(&cli.database_url, cli.pool_size)?;
    let storage = PgStorage::new(pool, cli.schema.as_str())?;
    tracing::info!(schema = %cli.schema, "Using Postgres storage");

    Ok(AppState::new(storage))
}

#[cfg(feature = "inmemory")]
fn init_state(_cli: &Cli) -> Result<AppState> {
    use crate::storage::memory::InMemoryStorage;

    tracing::info!("Using in-memory storage");
    Ok(AppState::new(InMemoryStorage::new()))
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
