use async_trait::async_trait;
use hookscope_core::AppResult;
use hookscope_domain::{ChangeKind, FilterField, NewWebhook, WebhookRecord};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::WebhookQuery;

/// Mutable parts of a stored delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookUpdate {
    /// Replacement event type.
    pub event_type: Option<String>,
    /// Replacement payload; repository and sender are re-derived from it.
    pub payload: Option<Value>,
}

impl WebhookUpdate {
    /// Returns whether the update carries no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none() && self.payload.is_none()
    }
}

/// Repository port for persisted webhook deliveries.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Stores a new delivery and returns the persisted record.
    async fn insert_webhook(&self, webhook: NewWebhook) -> AppResult<WebhookRecord>;

    /// Looks up a delivery by store identifier.
    async fn find_webhook(&self, id: &str) -> AppResult<Option<WebhookRecord>>;

    /// Runs a filtered query, newest first.
    async fn query_webhooks(&self, query: WebhookQuery) -> AppResult<Vec<WebhookRecord>>;

    /// Lists the distinct observed values of one filterable field across the whole store.
    async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>>;

    /// Applies an update and returns the new row, or `None` when the id is unknown.
    async fn update_webhook(
        &self,
        id: &str,
        update: WebhookUpdate,
    ) -> AppResult<Option<WebhookRecord>>;

    /// Deletes a delivery and returns whether a row was removed.
    async fn delete_webhook(&self, id: &str) -> AppResult<bool>;
}

/// Raw change notification as emitted by a record store.
///
/// Row images stay untyped until the consumer validates them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWebhookChange {
    /// Change kind.
    pub kind: ChangeKind,
    /// Row image before the change.
    pub old: Option<Value>,
    /// Row image after the change.
    pub new: Option<Value>,
}

/// Live subscription to the webhook change stream.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct WebhookSubscription {
    receiver: mpsc::Receiver<RawWebhookChange>,
    forwarder: Option<JoinHandle<()>>,
}

impl WebhookSubscription {
    /// Wraps a change receiver and the task feeding it.
    #[must_use]
    pub fn new(
        receiver: mpsc::Receiver<RawWebhookChange>,
        forwarder: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            receiver,
            forwarder,
        }
    }

    /// Waits for the next change; `None` once the feed is closed.
    pub async fn next_change(&mut self) -> Option<RawWebhookChange> {
        self.receiver.recv().await
    }
}

impl Drop for WebhookSubscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Change stream port.
#[async_trait]
pub trait WebhookChangeFeed: Send + Sync {
    /// Opens a subscription; returns once the store acknowledged it.
    async fn subscribe(&self) -> AppResult<WebhookSubscription>;
}
