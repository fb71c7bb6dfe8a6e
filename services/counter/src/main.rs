use std::time::Duration;

use anyhow::Result;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

mod config;
mod error;
mod routes;
mod state;

use common::database::{self, DatabaseConfig};
use session_store::{RecordStore, SessionStore};
use tokio::net::TcpListener;

use crate::{config::ServiceConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting counter service");

    let service_config = ServiceConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;

    if db_config.is_sqlite() {
        let pool = database::init_sqlite_pool(&db_config).await?;
        let store =
            SessionStore::sqlite(pool, service_config.store_options(), service_config.keys())
                .await?;
        serve(store, &service_config).await
    } else if db_config.is_mysql() {
        let pool = database::init_mysql_pool(&db_config).await?;

        if database::mysql_health_check(&pool).await? {
            info!("Database connection successful");
        } else {
            anyhow::bail!("Failed to connect to database");
        }

        let store =
            SessionStore::mysql(pool, service_config.store_options(), service_config.keys())
                .await?;
        serve(store, &service_config).await
    } else {
        let pool = database::init_pool(&db_config).await?;

        // Check database connectivity
        if database::health_check(&pool).await? {
            info!("Database connection successful");
        } else {
            anyhow::bail!("Failed to connect to database");
        }

        let store =
            SessionStore::postgres(pool, service_config.store_options(), service_config.keys())
                .await?;
        serve(store, &service_config).await
    }
}

async fn serve<R: RecordStore>(store: SessionStore<R>, config: &ServiceConfig) -> Result<()> {
    let cleanup =
        store.spawn_periodic_cleanup(Duration::from_secs(config.cleanup_interval_secs));

    let app = routes::create_router(AppState { sessions: store });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Counter service listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.stop().await;
    info!("Counter service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
