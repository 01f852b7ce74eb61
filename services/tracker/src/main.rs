use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod config;
mod engine;
mod error;
mod jobs;
mod models;
mod repositories;
mod routes;
mod state;
mod sync;
mod transitions;
mod xp;

use common::database::{DatabaseConfig, init_pool};
use common::error::DatabaseError;

use crate::config::TrackerConfig;
use crate::engine::SessionEngine;
use crate::jobs::reaper::StalenessReaper;
use crate::jobs::sync_retry::SyncRetryJob;
use crate::repositories::SessionRepository;
use crate::state::AppState;
use crate::sync::DjangoSyncClient;

const SCHEMA: &str = include_str!("schema.sql");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting tracker service");

    let config = TrackerConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Apply the session schema (idempotent)
    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    info!("Tracker service initialized successfully");

    // Initialize the lifecycle engine and background jobs
    let session_repository = SessionRepository::new(pool.clone());
    let engine = SessionEngine::new(pool.clone(), session_repository.clone());

    let reaper = StalenessReaper::new(
        engine.clone(),
        session_repository.clone(),
        config.heartbeat_timeout_seconds,
    );
    reaper.start(&config.reaper_schedule).await?;

    let sync_client = DjangoSyncClient::new(config.django_base_url.clone());
    let sync_job = SyncRetryJob::new(
        session_repository.clone(),
        sync_client,
        config.sync_batch_size,
    );
    sync_job.start(&config.sync_schedule).await?;

    let app_state = AppState {
        db_pool: pool,
        engine,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Tracker service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
