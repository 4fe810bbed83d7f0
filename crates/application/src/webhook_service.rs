use std::collections::BTreeMap;
use std::sync::Arc;

use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, NewWebhook, UNKNOWN_EVENT_TYPE, WebhookRecord};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{WebhookQuery, WebhookRepository, WebhookUpdate};

#[cfg(test)]
mod tests;

/// Default row count of the list endpoint.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Upper bound accepted for the list limit.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Inbound delivery as read from the HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundDelivery {
    /// Value of the `X-GitHub-Delivery` header.
    pub delivery_id: Option<String>,
    /// Value of the `X-GitHub-Event` header.
    pub event_type: Option<String>,
    /// Raw request body.
    pub body: Vec<u8>,
    /// Header snapshot, lowercased names.
    pub headers: BTreeMap<String, String>,
}

/// Ingestion and read use-cases over the record store.
#[derive(Clone)]
pub struct WebhookService {
    repository: Arc<dyn WebhookRepository>,
}

impl WebhookService {
    /// Creates a webhook service.
    #[must_use]
    pub fn new(repository: Arc<dyn WebhookRepository>) -> Self {
        Self { repository }
    }

    /// Stores one inbound delivery.
    pub async fn ingest(&self, delivery: InboundDelivery) -> AppResult<WebhookRecord> {
        let github_id = non_blank(delivery.delivery_id).unwrap_or_else(fallback_delivery_id);
        let event_type =
            non_blank(delivery.event_type).unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_owned());
        let payload = parse_payload(delivery.body.as_slice(), github_id.as_str());

        let webhook = NewWebhook::new(github_id, event_type, payload, delivery.headers)?;
        let record = self.repository.insert_webhook(webhook).await?;

        info!(
            webhook_id = %record.id(),
            github_id = %record.github_id(),
            event_type = %record.event_type(),
            "webhook delivery stored"
        );

        Ok(record)
    }

    /// Lists the newest deliveries, optionally of one event type. A missing
    /// or zero limit falls back to the default.
    pub async fn list_webhooks(
        &self,
        event_type: Option<&str>,
        limit: Option<usize>,
    ) -> AppResult<Vec<WebhookRecord>> {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        let event_type = event_type.filter(|value| !value.trim().is_empty());

        self.repository
            .query_webhooks(WebhookQuery::by_event_type(event_type, limit))
            .await
    }

    /// Returns one delivery by store id.
    pub async fn get_webhook(&self, id: &str) -> AppResult<WebhookRecord> {
        self.repository
            .find_webhook(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Applies a partial update to one delivery.
    pub async fn update_webhook(&self, id: &str, update: WebhookUpdate) -> AppResult<WebhookRecord> {
        if update.is_empty() {
            return Err(AppError::Validation(
                "webhook update must set event_type or payload".to_owned(),
            ));
        }

        let record = self
            .repository
            .update_webhook(id, update)
            .await?
            .ok_or_else(|| not_found(id))?;

        info!(webhook_id = %record.id(), event_type = %record.event_type(), "webhook updated");
        Ok(record)
    }

    /// Deletes one delivery.
    pub async fn delete_webhook(&self, id: &str) -> AppResult<()> {
        if !self.repository.delete_webhook(id).await? {
            return Err(not_found(id));
        }

        info!(webhook_id = %id, "webhook deleted");
        Ok(())
    }

    /// Lists the sorted distinct values observed for one filter field.
    pub async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        let values = self.repository.distinct_values(field).await?;
        Ok(normalize_distinct_values(values))
    }
}

/// Drops empty values, then sorts and deduplicates.
pub(crate) fn normalize_distinct_values(mut values: Vec<String>) -> Vec<String> {
    values.retain(|value| !value.is_empty());
    values.sort();
    values.dedup();
    values
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn fallback_delivery_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn parse_payload(body: &[u8], github_id: &str) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Value::Object(Map::new()),
        Ok(payload) => payload,
        Err(error) => {
            warn!(%github_id, error = %error, "webhook body is not valid json, storing empty payload");
            Value::Object(Map::new())
        }
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("webhook '{id}' does not exist"))
}
