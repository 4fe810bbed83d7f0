use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;

use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, NewWebhook, WebhookRecord};

use crate::{WebhookQuery, WebhookRepository, WebhookUpdate};

use super::{DEFAULT_LIST_LIMIT, InboundDelivery, MAX_LIST_LIMIT, WebhookService};

#[derive(Default)]
struct FakeWebhookRepository {
    records: Mutex<Vec<WebhookRecord>>,
    fail_writes: bool,
    last_limit: Mutex<Option<usize>>,
}

#[async_trait]
impl WebhookRepository for FakeWebhookRepository {
    async fn insert_webhook(&self, webhook: NewWebhook) -> AppResult<WebhookRecord> {
        if self.fail_writes {
            return Err(AppError::StoreWrite("connection refused".to_owned()));
        }

        let mut records = self.records.lock().await;
        let record = webhook.into_record(format!("id-{}", records.len() + 1), Utc::now())?;
        records.insert(0, record.clone());
        Ok(record)
    }

    async fn find_webhook(&self, id: &str) -> AppResult<Option<WebhookRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| record.id() == id)
            .cloned())
    }

    async fn query_webhooks(&self, query: WebhookQuery) -> AppResult<Vec<WebhookRecord>> {
        *self.last_limit.lock().await = Some(query.limit());
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| query.matches(record))
            .take(query.limit())
            .cloned()
            .collect())
    }

    async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter_map(|record| field.value_of(record))
            .collect())
    }

    async fn update_webhook(
        &self,
        id: &str,
        update: WebhookUpdate,
    ) -> AppResult<Option<WebhookRecord>> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|record| record.id() == id) else {
            return Ok(None);
        };

        if let Some(event_type) = update.event_type {
            record.retag(event_type, Utc::now())?;
        }
        if let Some(payload) = update.payload {
            record.replace_payload(payload, Utc::now());
        }

        Ok(Some(record.clone()))
    }

    async fn delete_webhook(&self, id: &str) -> AppResult<bool> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| record.id() != id);
        Ok(records.len() != before)
    }
}

fn service() -> (WebhookService, Arc<FakeWebhookRepository>) {
    let repository = Arc::new(FakeWebhookRepository::default());
    (WebhookService::new(repository.clone()), repository)
}

fn delivery(delivery_id: Option<&str>, event_type: Option<&str>, body: &[u8]) -> InboundDelivery {
    InboundDelivery {
        delivery_id: delivery_id.map(str::to_owned),
        event_type: event_type.map(str::to_owned),
        body: body.to_vec(),
        headers: BTreeMap::from([("user-agent".to_owned(), "GitHub-Hookshot/1".to_owned())]),
    }
}

#[tokio::test]
async fn ingest_stores_headers_and_extracted_fields() {
    let (service, _) = service();
    let body = json!({
        "repository": {"full_name": "octo/hello"},
        "sender": {"login": "octocat"}
    })
    .to_string();

    let record = service
        .ingest(delivery(Some("d-1"), Some("push"), body.as_bytes()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(record.github_id(), "d-1");
    assert_eq!(record.event_type(), "push");
    assert_eq!(record.repository(), Some("octo/hello"));
    assert_eq!(record.sender(), Some("octocat"));
    assert_eq!(
        record.headers().get("user-agent").map(String::as_str),
        Some("GitHub-Hookshot/1")
    );
}

#[tokio::test]
async fn ingest_without_headers_uses_fallbacks() {
    let (service, _) = service();

    let record = service
        .ingest(delivery(None, Some(" "), b"{}"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(record.event_type(), "unknown");
    assert_eq!(record.github_id().len(), 32);
}

#[tokio::test]
async fn ingest_with_invalid_body_stores_empty_payload() {
    let (service, _) = service();

    let record = service
        .ingest(delivery(Some("d-2"), Some("ping"), b"not json"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(record.payload(), &json!({}));
}

#[tokio::test]
async fn ingest_surfaces_store_write_failures() {
    let service = WebhookService::new(Arc::new(FakeWebhookRepository {
        fail_writes: true,
        ..FakeWebhookRepository::default()
    }));

    let result = service
        .ingest(delivery(Some("d-3"), Some("push"), b"{}"))
        .await;

    assert!(matches!(result, Err(AppError::StoreWrite(message)) if message == "connection refused"));
}

#[tokio::test]
async fn list_caps_limit_and_filters_event_type() {
    let (service, repository) = service();
    for (id, event_type) in [("a", "push"), ("b", "release"), ("c", "push")] {
        service
            .ingest(delivery(Some(id), Some(event_type), b"{}"))
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    let pushes = service
        .list_webhooks(Some("push"), Some(5_000))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(pushes.len(), 2);
    assert!(pushes.iter().all(|record| record.event_type() == "push"));
    assert_eq!(*repository.last_limit.lock().await, Some(MAX_LIST_LIMIT));
}

#[tokio::test]
async fn zero_limit_falls_back_to_default() {
    let (service, repository) = service();
    service
        .ingest(delivery(Some("a"), Some("push"), b"{}"))
        .await
        .unwrap_or_else(|_| unreachable!());

    let listed = service
        .list_webhooks(None, Some(0))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(listed.len(), 1);
    assert_eq!(*repository.last_limit.lock().await, Some(DEFAULT_LIST_LIMIT));
}

#[tokio::test]
async fn get_missing_webhook_is_not_found() {
    let (service, _) = service();

    let result = service.get_webhook("missing").await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let (service, _) = service();

    let result = service
        .update_webhook("id-1", WebhookUpdate::default())
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn update_and_delete_report_missing_rows() {
    let (service, _) = service();
    let record = service
        .ingest(delivery(Some("d-4"), Some("push"), b"{}"))
        .await
        .unwrap_or_else(|_| unreachable!());

    let updated = service
        .update_webhook(
            record.id(),
            WebhookUpdate {
                event_type: Some("release".to_owned()),
                payload: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.event_type(), "release");

    assert!(service.delete_webhook(record.id()).await.is_ok());
    assert!(matches!(
        service.delete_webhook(record.id()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn distinct_values_are_sorted_and_unique() {
    let (service, _) = service();
    for (id, workflow_id) in [("a", json!(9)), ("b", json!("10")), ("c", json!(9))] {
        let body = json!({ "workflow_id": workflow_id }).to_string();
        service
            .ingest(delivery(Some(id), Some("workflow_run"), body.as_bytes()))
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    let values = service
        .distinct_values(FilterField::WorkflowId)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(values, vec!["10".to_owned(), "9".to_owned()]);
}
