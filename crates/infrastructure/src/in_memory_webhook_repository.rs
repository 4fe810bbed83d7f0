use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use hookscope_application::{
    RawWebhookChange, WebhookChangeFeed, WebhookQuery, WebhookRepository, WebhookSubscription,
    WebhookUpdate,
};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::{ChangeKind, FilterField, NewWebhook, WebhookRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::warn;
use uuid::Uuid;


const CHANGE_BUFFER: usize = 256;

/// In-memory webhook store with a broadcast change feed.
#[derive(Debug)]
pub struct InMemoryWebhookRepository {
    records: RwLock<HashMap<String, WebhookRecord>>,
    changes: broadcast::Sender<RawWebhookChange>,
}

impl Default for InMemoryWebhookRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWebhookRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn publish(&self, change: RawWebhookChange) {
        // No live subscriber is not an error.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn insert_webhook(&self, webhook: NewWebhook) -> AppResult<WebhookRecord> {
        let mut records = self.records.write().await;

        if records
            .values()
            .any(|record| record.github_id() == webhook.github_id())
        {
            return Err(AppError::Conflict(format!(
                "webhook delivery '{}' already exists",
                webhook.github_id()
            )));
        }

        let record = webhook.into_record(Uuid::new_v4().to_string(), Utc::now())?;
        records.insert(record.id().to_owned(), record.clone());
        self.publish(RawWebhookChange {
            kind: ChangeKind::Insert,
            old: None,
            new: Some(record.to_row_image()),
        });

        Ok(record)
    }

    async fn find_webhook(&self, id: &str) -> AppResult<Option<WebhookRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn query_webhooks(&self, query: WebhookQuery) -> AppResult<Vec<WebhookRecord>> {
        let records = self.records.read().await;

        let mut matched: Vec<WebhookRecord> = records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        matched.sort_by(|left, right| {
            right
                .created_at()
                .cmp(&left.created_at())
                .then_with(|| right.id().cmp(left.id()))
        });
        matched.truncate(query.limit());

        Ok(matched)
    }

    async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        let records = self.records.read().await;

        let values: BTreeSet<String> = records
            .values()
            .filter_map(|record| field.value_of(record))
            .filter(|value| !value.is_empty())
            .collect();

        Ok(values.into_iter().collect())
    }

    async fn update_webhook(
        &self,
        id: &str,
        update: WebhookUpdate,
    ) -> AppResult<Option<WebhookRecord>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };

        let old = record.to_row_image();
        let now = Utc::now();
        let mut updated = record.clone();
        if let Some(event_type) = update.event_type {
            updated.retag(event_type, now)?;
        }
        if let Some(payload) = update.payload {
            updated.replace_payload(payload, now);
        }
        *record = updated.clone();

        self.publish(RawWebhookChange {
            kind: ChangeKind::Update,
            old: Some(old),
            new: Some(updated.to_row_image()),
        });

        Ok(Some(updated))
    }

    async fn delete_webhook(&self, id: &str) -> AppResult<bool> {
        let mut records = self.records.write().await;
        let Some(removed) = records.remove(id) else {
            return Ok(false);
        };

        self.publish(RawWebhookChange {
            kind: ChangeKind::Delete,
            old: Some(removed.to_row_image()),
            new: None,
        });

        Ok(true)
    }
}

#[async_trait]
impl WebhookChangeFeed for InMemoryWebhookRepository {
    async fn subscribe(&self) -> AppResult<WebhookSubscription> {
        let mut changes = self.changes.subscribe();
        let (sender, receiver) = mpsc::channel(CHANGE_BUFFER);

        let forwarder = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if sender.send(change).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "in-memory change feed subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(WebhookSubscription::new(receiver, Some(forwarder)))
    }
}
