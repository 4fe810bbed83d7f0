mod common;
mod webhooks;

pub use common::HealthResponse;
pub use webhooks::{
    DeleteWebhookResponse, FilterValuesQuery, FilterValuesResponse, IngestFailureResponse,
    IngestWebhookResponse, ListWebhooksQuery, UpdateWebhookRequest, WebhookDetailResponse,
    WebhookListResponse, WebhookResponse,
};
