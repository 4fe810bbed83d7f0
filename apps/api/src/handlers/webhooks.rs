use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hookscope_application::InboundDelivery;
use hookscope_core::AppError;
use hookscope_domain::FilterField;
use tracing::warn;

use crate::dto::{
    DeleteWebhookResponse, FilterValuesQuery, FilterValuesResponse, IngestFailureResponse,
    IngestWebhookResponse, ListWebhooksQuery, UpdateWebhookRequest, WebhookDetailResponse,
    WebhookListResponse, WebhookResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[cfg(test)]
mod tests;

const DELIVERY_HEADER: &str = "x-github-delivery";
const EVENT_HEADER: &str = "x-github-event";

pub async fn ingest_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = header_snapshot(&headers);
    let delivery = InboundDelivery {
        delivery_id: headers.get(DELIVERY_HEADER).cloned(),
        event_type: headers.get(EVENT_HEADER).cloned(),
        body: body.to_vec(),
        headers,
    };

    // Every insert failure, duplicate delivery ids included, is a 500.
    match state.webhook_service.ingest(delivery).await {
        Ok(record) => Json(IngestWebhookResponse {
            message: "Webhook received successfully".to_owned(),
            webhook_id: record.id().to_owned(),
        })
        .into_response(),
        Err(error) => {
            warn!(error = %error, "failed to store webhook delivery");

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(IngestFailureResponse {
                    message: "Failed to store webhook".to_owned(),
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn list_webhooks_handler(
    State(state): State<AppState>,
    Query(query): Query<ListWebhooksQuery>,
) -> ApiResult<Json<WebhookListResponse>> {
    let webhooks: Vec<WebhookResponse> = state
        .webhook_service
        .list_webhooks(query.event.as_deref(), query.limit)
        .await?
        .into_iter()
        .map(WebhookResponse::from)
        .collect();

    Ok(Json(WebhookListResponse {
        total: webhooks.len(),
        webhooks,
        success: true,
    }))
}

pub async fn get_webhook_handler(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<WebhookDetailResponse>> {
    let webhook = state
        .webhook_service
        .get_webhook(webhook_id.as_str())
        .await?;

    Ok(Json(WebhookDetailResponse {
        webhook: WebhookResponse::from(webhook),
        success: true,
    }))
}

pub async fn update_webhook_handler(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
    Json(payload): Json<UpdateWebhookRequest>,
) -> ApiResult<Json<WebhookDetailResponse>> {
    let webhook = state
        .webhook_service
        .update_webhook(webhook_id.as_str(), payload.into())
        .await?;

    Ok(Json(WebhookDetailResponse {
        webhook: WebhookResponse::from(webhook),
        success: true,
    }))
}

pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<DeleteWebhookResponse>> {
    state
        .webhook_service
        .delete_webhook(webhook_id.as_str())
        .await?;

    Ok(Json(DeleteWebhookResponse { success: true }))
}

pub async fn filter_values_handler(
    State(state): State<AppState>,
    Query(query): Query<FilterValuesQuery>,
) -> ApiResult<Json<FilterValuesResponse>> {
    let field = query
        .field
        .as_deref()
        .ok_or_else(|| ApiError(AppError::Validation("field is required".to_owned())))
        .and_then(|field| FilterField::parse_transport(field).map_err(ApiError::from))?;

    let values = state.webhook_service.distinct_values(field).await?;

    Ok(Json(FilterValuesResponse { values }))
}

/// Header snapshot keyed by lowercase name; repeated headers are comma-joined.
fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::<String, String>::new();

    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };

        snapshot
            .entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }

    snapshot
}
