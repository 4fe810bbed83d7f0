use async_trait::async_trait;
use hookscope_application::{
    RawWebhookChange, WebhookChangeFeed, WebhookRepository, WebhookSubscription,
};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::ChangeKind;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::PostgresWebhookRepository;

/// Channel the `webhooks` table trigger notifies on.
pub const WEBHOOK_CHANGES_CHANNEL: &str = "webhook_changes";

const CHANGE_BUFFER: usize = 256;

/// Change feed backed by `LISTEN webhook_changes`.
///
/// Notifications carry only the operation and row id; insert and update
/// images are read back from the table when the notification arrives.
#[derive(Clone)]
pub struct PostgresWebhookChangeFeed {
    pool: PgPool,
    repository: PostgresWebhookRepository,
}

impl PostgresWebhookChangeFeed {
    /// Creates a change feed over the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: PostgresWebhookRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl WebhookChangeFeed for PostgresWebhookChangeFeed {
    async fn subscribe(&self) -> AppResult<WebhookSubscription> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(|error| {
            AppError::StoreRead(format!("failed to open change listener: {error}"))
        })?;
        listener
            .listen(WEBHOOK_CHANGES_CHANNEL)
            .await
            .map_err(|error| {
                AppError::StoreRead(format!(
                    "failed to listen on '{WEBHOOK_CHANGES_CHANNEL}': {error}"
                ))
            })?;

        let (sender, receiver) = mpsc::channel(CHANGE_BUFFER);
        let repository = self.repository.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(error) => {
                        warn!(error = %error, "change listener failed");
                        break;
                    }
                };

                let Some(change) = resolve_notification(&repository, notification.payload()).await
                else {
                    continue;
                };

                if sender.send(change).await.is_err() {
                    break;
                }
            }
        });

        Ok(WebhookSubscription::new(receiver, Some(forwarder)))
    }
}

async fn resolve_notification(
    repository: &PostgresWebhookRepository,
    payload: &str,
) -> Option<RawWebhookChange> {
    let notification = match serde_json::from_str::<Value>(payload) {
        Ok(notification) => notification,
        Err(error) => {
            debug!(error = %error, "ignoring unparseable change notification");
            return None;
        }
    };

    let kind = notification
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|kind| ChangeKind::parse_transport(kind).ok())?;
    let id = notification.get("id").and_then(Value::as_str)?;
    let old = Some(json!({ "id": id }));

    match kind {
        ChangeKind::Delete => Some(RawWebhookChange {
            kind,
            old,
            new: None,
        }),
        ChangeKind::Insert | ChangeKind::Update => {
            // A row deleted before it is read back yields an event without
            // its new image, which consumers drop.
            let new = match repository.find_webhook(id).await {
                Ok(record) => record.map(|record| record.to_row_image()),
                Err(error) => {
                    warn!(webhook_id = %id, error = %error, "failed to read changed webhook");
                    None
                }
            };

            Some(RawWebhookChange { kind, old, new })
        }
    }
}
