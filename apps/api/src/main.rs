//! Hookscope API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use hookscope_application::{WebhookRepository, WebhookService};
use hookscope_core::AppError;
use hookscope_infrastructure::{InMemoryWebhookRepository, PostgresWebhookRepository};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageBackend, init_tracing};
use crate::api_router::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let repository: Arc<dyn WebhookRepository> = match &config.storage_backend {
        StorageBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            Arc::new(PostgresWebhookRepository::new(pool))
        }
        StorageBackend::Memory => {
            warn!("using in-memory storage; deliveries are lost on restart");
            Arc::new(InMemoryWebhookRepository::new())
        }
    };

    let state = AppState {
        webhook_service: WebhookService::new(repository),
    };
    let app = build_router(state, config.frontend_url.as_str())?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(%address, "hookscope-api listening");
    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))?;

    Ok(())
}
