use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::body::{Bytes, to_bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use hookscope_application::{WebhookQuery, WebhookRepository, WebhookService, WebhookUpdate};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, NewWebhook, WebhookRecord};
use hookscope_infrastructure::InMemoryWebhookRepository;
use serde_json::{Value, json};

use super::{
    delete_webhook_handler, filter_values_handler, get_webhook_handler, header_snapshot,
    ingest_webhook_handler, list_webhooks_handler, update_webhook_handler,
};
use crate::dto::{FilterValuesQuery, ListWebhooksQuery, UpdateWebhookRequest};
use crate::state::AppState;

struct UnavailableRepository;

#[async_trait]
impl WebhookRepository for UnavailableRepository {
    async fn insert_webhook(&self, _webhook: NewWebhook) -> AppResult<WebhookRecord> {
        Err(AppError::StoreWrite("connection refused".to_owned()))
    }

    async fn find_webhook(&self, _id: &str) -> AppResult<Option<WebhookRecord>> {
        Err(AppError::StoreRead("connection refused".to_owned()))
    }

    async fn query_webhooks(&self, _query: WebhookQuery) -> AppResult<Vec<WebhookRecord>> {
        Err(AppError::StoreRead("connection refused".to_owned()))
    }

    async fn distinct_values(&self, _field: FilterField) -> AppResult<Vec<String>> {
        Err(AppError::StoreRead("connection refused".to_owned()))
    }

    async fn update_webhook(
        &self,
        _id: &str,
        _update: WebhookUpdate,
    ) -> AppResult<Option<WebhookRecord>> {
        Err(AppError::StoreWrite("connection refused".to_owned()))
    }

    async fn delete_webhook(&self, _id: &str) -> AppResult<bool> {
        Err(AppError::StoreWrite("connection refused".to_owned()))
    }
}

fn in_memory_state() -> AppState {
    AppState {
        webhook_service: WebhookService::new(Arc::new(InMemoryWebhookRepository::new())),
    }
}

fn github_headers(delivery_id: &str, event_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-github-delivery",
        HeaderValue::from_str(delivery_id).unwrap_or_else(|_| unreachable!()),
    );
    headers.insert(
        "x-github-event",
        HeaderValue::from_str(event_type).unwrap_or_else(|_| unreachable!()),
    );
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|_| unreachable!());
    serde_json::from_slice(&bytes).unwrap_or_else(|_| unreachable!())
}

async fn ingest(state: &AppState, delivery_id: &str, event_type: &str, payload: Value) -> String {
    let response = ingest_webhook_handler(
        State(state.clone()),
        github_headers(delivery_id, event_type),
        Bytes::from(payload.to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    body.get("webhookId")
        .and_then(Value::as_str)
        .unwrap_or_else(|| unreachable!())
        .to_owned()
}

#[tokio::test]
async fn ingestion_stores_delivery_with_header_snapshot() {
    let state = in_memory_state();

    let webhook_id = ingest(
        &state,
        "72d3162e-cc78-11e3-81ab-4c9367dc0958",
        "push",
        json!({"repository": {"full_name": "octo/hello"}, "sender": {"login": "octocat"}}),
    )
    .await;

    let Json(detail) = get_webhook_handler(State(state), Path(webhook_id.clone()))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(detail.success);
    assert_eq!(detail.webhook.id, webhook_id);
    assert_eq!(detail.webhook.github_id, "72d3162e-cc78-11e3-81ab-4c9367dc0958");
    assert_eq!(detail.webhook.event_type, "push");
    assert_eq!(detail.webhook.repository.as_deref(), Some("octo/hello"));
    assert_eq!(detail.webhook.sender.as_deref(), Some("octocat"));
    assert_eq!(
        detail.webhook.headers.get("x-github-event").map(String::as_str),
        Some("push")
    );
}

#[tokio::test]
async fn ingestion_without_github_headers_uses_fallbacks() {
    let state = in_memory_state();

    let response =
        ingest_webhook_handler(State(state.clone()), HeaderMap::new(), Bytes::from("not json"))
            .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let webhook_id = body
        .get("webhookId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let Json(detail) = get_webhook_handler(State(state), Path(webhook_id))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(detail.webhook.event_type, "unknown");
    assert_eq!(detail.webhook.payload, json!({}));
    assert!(!detail.webhook.github_id.is_empty());
}

#[tokio::test]
async fn ingestion_failure_reports_message_and_error() {
    let state = AppState {
        webhook_service: WebhookService::new(Arc::new(UnavailableRepository)),
    };

    let response = ingest_webhook_handler(
        State(state),
        github_headers("d-1", "push"),
        Bytes::from("{}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("Failed to store webhook")
    );
    assert!(
        body.get("error")
            .and_then(Value::as_str)
            .is_some_and(|error| error.contains("connection refused"))
    );
}

#[tokio::test]
async fn duplicate_delivery_fails_with_store_message() {
    let state = in_memory_state();
    ingest(&state, "d-1", "push", json!({})).await;

    let response = ingest_webhook_handler(
        State(state.clone()),
        github_headers("d-1", "push"),
        Bytes::from("{}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(
        body.get("message").and_then(Value::as_str),
        Some("Failed to store webhook")
    );
    assert!(
        body.get("error")
            .and_then(Value::as_str)
            .is_some_and(|error| error.contains("d-1") && error.contains("already exists"))
    );

    let Json(listed) = list_webhooks_handler(State(state), Query(ListWebhooksQuery::default()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn list_filters_by_event_and_reports_total() {
    let state = in_memory_state();
    ingest(&state, "d-1", "push", json!({})).await;
    ingest(&state, "d-2", "release", json!({})).await;
    ingest(&state, "d-3", "push", json!({})).await;

    let Json(all) = list_webhooks_handler(State(state.clone()), Query(ListWebhooksQuery::default()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(all.total, 3);
    assert!(all.success);

    let Json(pushes) = list_webhooks_handler(
        State(state.clone()),
        Query(ListWebhooksQuery {
            limit: Some(1),
            event: Some("push".to_owned()),
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(pushes.total, 1);
    assert!(pushes.webhooks.iter().all(|webhook| webhook.event_type == "push"));

    let Json(unlimited) = list_webhooks_handler(
        State(state),
        Query(ListWebhooksQuery {
            limit: Some(0),
            event: None,
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(unlimited.total, 3);
}

#[tokio::test]
async fn missing_webhook_is_not_found() {
    let state = in_memory_state();

    let result = get_webhook_handler(State(state.clone()), Path("missing".to_owned())).await;
    assert!(matches!(result, Err(ref error) if error.status() == StatusCode::NOT_FOUND));

    let deleted = delete_webhook_handler(State(state), Path("missing".to_owned())).await;
    assert!(matches!(deleted, Err(ref error) if error.status() == StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let state = in_memory_state();
    let webhook_id = ingest(&state, "d-1", "push", json!({})).await;

    let empty = update_webhook_handler(
        State(state.clone()),
        Path(webhook_id.clone()),
        Json(UpdateWebhookRequest::default()),
    )
    .await;
    assert!(matches!(empty, Err(ref error) if error.status() == StatusCode::BAD_REQUEST));

    let Json(updated) = update_webhook_handler(
        State(state.clone()),
        Path(webhook_id.clone()),
        Json(UpdateWebhookRequest {
            event_type: Some("release".to_owned()),
            payload: Some(json!({"repository": {"full_name": "octo/b"}})),
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.webhook.event_type, "release");
    assert_eq!(updated.webhook.repository.as_deref(), Some("octo/b"));

    let Json(deleted) = delete_webhook_handler(State(state.clone()), Path(webhook_id.clone()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(deleted.success);

    let gone = get_webhook_handler(State(state), Path(webhook_id)).await;
    assert!(gone.is_err());
}

#[tokio::test]
async fn filter_values_require_a_known_field() {
    let state = in_memory_state();
    ingest(&state, "d-1", "push", json!({"workflow_id": 7})).await;
    ingest(&state, "d-2", "issues", json!({"workflow_id": "build"})).await;

    let missing = filter_values_handler(
        State(state.clone()),
        Query(FilterValuesQuery::default()),
    )
    .await;
    assert!(matches!(missing, Err(ref error) if error.status() == StatusCode::BAD_REQUEST));

    let unknown = filter_values_handler(
        State(state.clone()),
        Query(FilterValuesQuery {
            field: Some("colors".to_owned()),
        }),
    )
    .await;
    assert!(matches!(unknown, Err(ref error) if error.status() == StatusCode::BAD_REQUEST));

    let Json(event_types) = filter_values_handler(
        State(state.clone()),
        Query(FilterValuesQuery {
            field: Some("event_types".to_owned()),
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(event_types.values, vec!["issues".to_owned(), "push".to_owned()]);

    let Json(workflow_ids) = filter_values_handler(
        State(state),
        Query(FilterValuesQuery {
            field: Some("workflow_ids".to_owned()),
        }),
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(workflow_ids.values, vec!["7".to_owned(), "build".to_owned()]);
}

#[test]
fn header_snapshot_joins_repeated_headers() {
    let mut headers = HeaderMap::new();
    headers.append("x-hub-signature", HeaderValue::from_static("a"));
    headers.append("x-hub-signature", HeaderValue::from_static("b"));
    headers.insert("user-agent", HeaderValue::from_static("GitHub-Hookshot/abc"));

    let snapshot = header_snapshot(&headers);

    assert_eq!(snapshot.get("x-hub-signature").map(String::as_str), Some("a, b"));
    assert_eq!(
        snapshot.get("user-agent").map(String::as_str),
        Some("GitHub-Hookshot/abc")
    );
}
