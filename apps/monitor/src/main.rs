//! Hookscope live view monitor.
//!
//! Follows the webhook store through the change feed and logs the filtered
//! view. Filter clauses come from `MONITOR_*` variables and can be changed
//! at runtime on standard input.

#![forbid(unsafe_code)]

mod filter_command;
mod monitor_config;

use std::sync::Arc;

use hookscope_application::{
    FilterController, RealtimeSynchronizer, ViewSnapshot, WebhookChangeFeed, WebhookRepository,
};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, FilterSpec};
use hookscope_infrastructure::{PostgresWebhookChangeFeed, PostgresWebhookRepository};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::filter_command::{MonitorCommand, parse_command};
use crate::monitor_config::{MonitorConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = MonitorConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let repository: Arc<dyn WebhookRepository> =
        Arc::new(PostgresWebhookRepository::new(pool.clone()));
    let change_feed: Arc<dyn WebhookChangeFeed> = Arc::new(PostgresWebhookChangeFeed::new(pool));

    let mut controller = FilterController::new(repository.clone());
    for patch in config.filter_patches {
        controller.set_filter(patch);
    }

    for field in FilterField::ALL {
        log_distinct_values(&controller, field).await;
    }

    let synchronizer = RealtimeSynchronizer::new(repository, change_feed);
    log_filter(controller.filter());
    synchronizer.initialize(controller.filter().clone()).await;
    info!("hookscope-monitor started");

    let mut snapshots = synchronizer.subscribe_snapshots();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&snapshot);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    handle_line(&mut controller, &synchronizer, line.as_str()).await;
                }
                Ok(None) => stdin_open = false,
                Err(error) => {
                    warn!(error = %error, "failed to read monitor input");
                    stdin_open = false;
                }
            },
            result = &mut shutdown => {
                if let Err(error) = result {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    synchronizer.teardown().await;
    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn handle_line(
    controller: &mut FilterController,
    synchronizer: &RealtimeSynchronizer,
    line: &str,
) {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(error) => {
            warn!(error = %error, "ignoring monitor input");
            return;
        }
    };

    let changed = match command {
        MonitorCommand::Apply(patch) => controller.set_filter(patch),
        MonitorCommand::Clear => controller.clear(),
        MonitorCommand::Values(field) => {
            log_distinct_values(controller, field).await;
            return;
        }
        MonitorCommand::Show => {
            log_filter(controller.filter());
            log_snapshot(&synchronizer.snapshot());
            return;
        }
    };

    if !changed {
        info!("filter unchanged");
        return;
    }

    log_filter(controller.filter());
    synchronizer.reconfigure(controller.filter().clone()).await;
}

async fn log_distinct_values(controller: &FilterController, field: FilterField) {
    // Lookup failures are logged by the controller.
    if let Ok(values) = controller.distinct_values(field).await {
        info!(field = field.as_str(), count = values.len(), values = ?values, "filter options");
    }
}

fn log_filter(filter: &FilterSpec) {
    info!(
        event_types = ?filter.event_types,
        repositories = ?filter.repositories,
        senders = ?filter.senders,
        since = ?filter.date_range.start,
        until = ?filter.date_range.end,
        github_id = ?filter.github_id_needle(),
        workflow_id = ?filter.workflow_id_value(),
        "active filter"
    );
}

fn log_snapshot(snapshot: &ViewSnapshot) {
    info!(
        epoch = snapshot.epoch,
        status = snapshot.status.as_str(),
        total = snapshot.stats.total,
        last_hour = snapshot.stats.recent_count,
        events = ?snapshot.stats.events,
        newest = ?snapshot.records.first().map(|record| record.github_id()),
        "view updated"
    );
}
