use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookscope_application::{WebhookQuery, WebhookRepository, WebhookUpdate};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, NewWebhook, WebhookRecord};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

mod query;


const WEBHOOK_COLUMNS: &str =
    "id, github_id, event_type, repository, sender, payload, headers, created_at, updated_at";

/// PostgreSQL-backed webhook repository.
#[derive(Clone)]
pub struct PostgresWebhookRepository {
    pool: PgPool,
}

impl PostgresWebhookRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct WebhookRow {
    id: Uuid,
    github_id: String,
    event_type: String,
    repository: Option<String>,
    sender: Option<String>,
    payload: Value,
    headers: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookRow> for WebhookRecord {
    type Error = AppError;

    fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
        WebhookRecord::new(
            row.id.to_string(),
            row.github_id,
            row.event_type,
            row.repository,
            row.sender,
            row.payload,
            row.headers.0,
            row.created_at,
            row.updated_at,
        )
    }
}

fn parse_webhook_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn read_error(operation: &str, error: sqlx::Error) -> AppError {
    AppError::StoreRead(format!("failed to {operation}: {error}"))
}

fn write_error(operation: &str, error: sqlx::Error) -> AppError {
    AppError::StoreWrite(format!("failed to {operation}: {error}"))
}

#[async_trait]
impl WebhookRepository for PostgresWebhookRepository {
    async fn insert_webhook(&self, webhook: NewWebhook) -> AppResult<WebhookRecord> {
        let result = sqlx::query_as::<_, WebhookRow>(&format!(
            r#"
            INSERT INTO webhooks (github_id, event_type, repository, sender, payload, headers)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {WEBHOOK_COLUMNS}
            "#
        ))
        .bind(webhook.github_id())
        .bind(webhook.event_type())
        .bind(webhook.repository())
        .bind(webhook.sender())
        .bind(webhook.payload())
        .bind(Json(webhook.headers()))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => WebhookRecord::try_from(row),
            Err(error) => {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23505")
                {
                    return Err(AppError::Conflict(format!(
                        "webhook delivery '{}' already exists",
                        webhook.github_id()
                    )));
                }

                Err(write_error("insert webhook", error))
            }
        }
    }

    async fn find_webhook(&self, id: &str) -> AppResult<Option<WebhookRecord>> {
        let Some(id) = parse_webhook_id(id) else {
            return Ok(None);
        };

        sqlx::query_as::<_, WebhookRow>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| read_error("find webhook", error))?
        .map(WebhookRecord::try_from)
        .transpose()
    }

    async fn query_webhooks(&self, query: WebhookQuery) -> AppResult<Vec<WebhookRecord>> {
        self.query_webhooks_impl(query).await
    }

    async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        self.distinct_values_impl(field).await
    }

    async fn update_webhook(
        &self,
        id: &str,
        update: WebhookUpdate,
    ) -> AppResult<Option<WebhookRecord>> {
        let Some(id) = parse_webhook_id(id) else {
            return Ok(None);
        };

        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| write_error("begin webhook update", error))?;

        let row = sqlx::query_as::<_, WebhookRow>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| read_error("lock webhook for update", error))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut record = WebhookRecord::try_from(row)?;
        let now = Utc::now();
        if let Some(event_type) = update.event_type {
            record.retag(event_type, now)?;
        }
        if let Some(payload) = update.payload {
            record.replace_payload(payload, now);
        }

        sqlx::query(
            r#"
            UPDATE webhooks
            SET event_type = $2,
                repository = $3,
                sender = $4,
                payload = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(record.event_type())
        .bind(record.repository())
        .bind(record.sender())
        .bind(record.payload())
        .bind(record.updated_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| write_error("update webhook", error))?;

        transaction
            .commit()
            .await
            .map_err(|error| write_error("commit webhook update", error))?;

        Ok(Some(record))
    }

    async fn delete_webhook(&self, id: &str) -> AppResult<bool> {
        let Some(id) = parse_webhook_id(id) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| write_error("delete webhook", error))?;

        Ok(result.rows_affected() > 0)
    }
}
