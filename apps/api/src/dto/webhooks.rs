use std::collections::BTreeMap;

use hookscope_application::WebhookUpdate;
use hookscope_domain::WebhookRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// API representation of a stored delivery.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/webhook-response.ts"
)]
pub struct WebhookResponse {
    pub id: String,
    pub github_id: String,
    pub event_type: String,
    pub repository: Option<String>,
    pub sender: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub payload: Value,
    pub headers: BTreeMap<String, String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl From<WebhookRecord> for WebhookResponse {
    fn from(value: WebhookRecord) -> Self {
        Self {
            id: value.id().to_owned(),
            github_id: value.github_id().to_owned(),
            event_type: value.event_type().to_owned(),
            repository: value.repository().map(ToOwned::to_owned),
            sender: value.sender().map(ToOwned::to_owned),
            payload: value.payload().clone(),
            headers: value.headers().clone(),
            created_at: value.created_at().to_rfc3339(),
            updated_at: value.updated_at().to_rfc3339(),
        }
    }
}

/// Ingestion acknowledgement.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/ingest-webhook-response.ts"
)]
pub struct IngestWebhookResponse {
    pub message: String,
    pub webhook_id: String,
}

/// Ingestion failure body.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/ingest-failure-response.ts"
)]
pub struct IngestFailureResponse {
    pub message: String,
    pub error: String,
}

/// Query string of the list endpoint.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/list-webhooks-query.ts"
)]
pub struct ListWebhooksQuery {
    pub limit: Option<usize>,
    pub event: Option<String>,
}

/// Newest deliveries, optionally of one event type.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/webhook-list-response.ts"
)]
pub struct WebhookListResponse {
    pub webhooks: Vec<WebhookResponse>,
    pub total: usize,
    pub success: bool,
}

/// One delivery.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/webhook-detail-response.ts"
)]
pub struct WebhookDetailResponse {
    pub webhook: WebhookResponse,
    pub success: bool,
}

/// Query string of the filter-values endpoint.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/filter-values-query.ts"
)]
pub struct FilterValuesQuery {
    #[ts(type = "\"event_types\" | \"repositories\" | \"senders\" | \"workflow_ids\" | null")]
    pub field: Option<String>,
}

/// Sorted distinct values of one filter field.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/filter-values-response.ts"
)]
pub struct FilterValuesResponse {
    pub values: Vec<String>,
}

/// Partial delivery update.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/update-webhook-request.ts"
)]
pub struct UpdateWebhookRequest {
    pub event_type: Option<String>,
    #[ts(type = "Record<string, unknown> | null")]
    pub payload: Option<Value>,
}

impl From<UpdateWebhookRequest> for WebhookUpdate {
    fn from(value: UpdateWebhookRequest) -> Self {
        Self {
            event_type: value.event_type,
            payload: value.payload,
        }
    }
}

/// Delete acknowledgement.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/delete-webhook-response.ts"
)]
pub struct DeleteWebhookResponse {
    pub success: bool,
}
