use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hookscope_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event type stored when a delivery arrives without an event header.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Persisted webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookRecord {
    id: NonEmptyString,
    github_id: NonEmptyString,
    event_type: NonEmptyString,
    repository: Option<String>,
    sender: Option<String>,
    payload: Value,
    headers: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row image shape produced by record stores and change feeds.
#[derive(Debug, Deserialize)]
struct WebhookRowImage {
    id: String,
    github_id: String,
    event_type: String,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WebhookRecord {
    /// Rebuilds a stored record from persisted parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        github_id: impl Into<String>,
        event_type: impl Into<String>,
        repository: Option<String>,
        sender: Option<String>,
        payload: Value,
        headers: BTreeMap<String, String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            github_id: NonEmptyString::new(github_id)?,
            event_type: NonEmptyString::new(event_type)?,
            repository,
            sender,
            payload,
            headers,
            created_at,
            updated_at,
        })
    }

    /// Parses a JSON row image as delivered by a change feed.
    pub fn from_row_image(image: &Value) -> AppResult<Self> {
        let row = WebhookRowImage::deserialize(image).map_err(|error| {
            AppError::Validation(format!("invalid webhook row image: {error}"))
        })?;

        Self::new(
            row.id,
            row.github_id,
            row.event_type,
            row.repository,
            row.sender,
            row.payload.unwrap_or_else(|| Value::Object(Map::new())),
            row.headers.unwrap_or_default(),
            row.created_at,
            row.updated_at,
        )
    }

    /// Serializes the record into the row image shape accepted by `from_row_image`.
    #[must_use]
    pub fn to_row_image(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns the store identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the GitHub delivery identifier.
    #[must_use]
    pub fn github_id(&self) -> &str {
        self.github_id.as_str()
    }

    /// Returns the GitHub event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.event_type.as_str()
    }

    /// Returns the repository full name, if the payload carried one.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    /// Returns the sender login, if the payload carried one.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Returns the raw delivery body.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the header snapshot taken at ingestion.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the event type and bumps `updated_at` without moving it backwards.
    pub fn retag(&mut self, event_type: impl Into<String>, now: DateTime<Utc>) -> AppResult<()> {
        self.event_type = NonEmptyString::new(event_type)?;
        self.touch(now);
        Ok(())
    }

    /// Replaces the payload, re-deriving repository and sender from it.
    pub fn replace_payload(&mut self, payload: Value, now: DateTime<Utc>) {
        self.repository = repository_from_payload(&payload);
        self.sender = sender_from_payload(&payload);
        self.payload = payload;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Validated input for storing a new delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhook {
    github_id: NonEmptyString,
    event_type: NonEmptyString,
    repository: Option<String>,
    sender: Option<String>,
    payload: Value,
    headers: BTreeMap<String, String>,
}

impl NewWebhook {
    /// Builds an insert input, deriving repository and sender from the payload.
    pub fn new(
        github_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
        headers: BTreeMap<String, String>,
    ) -> AppResult<Self> {
        Ok(Self {
            github_id: NonEmptyString::new(github_id)?,
            event_type: NonEmptyString::new(event_type)?,
            repository: repository_from_payload(&payload),
            sender: sender_from_payload(&payload),
            payload,
            headers,
        })
    }

    /// Returns the delivery identifier.
    #[must_use]
    pub fn github_id(&self) -> &str {
        self.github_id.as_str()
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.event_type.as_str()
    }

    /// Returns the repository full name derived from the payload.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    /// Returns the sender login derived from the payload.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Returns the delivery body.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the header snapshot.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Materializes the stored record once the store assigned an id and timestamp.
    pub fn into_record(self, id: impl Into<String>, now: DateTime<Utc>) -> AppResult<WebhookRecord> {
        WebhookRecord::new(
            id,
            self.github_id,
            self.event_type,
            self.repository,
            self.sender,
            self.payload,
            self.headers,
            now,
            now,
        )
    }
}

fn repository_from_payload(payload: &Value) -> Option<String> {
    payload
        .pointer("/repository/full_name")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn sender_from_payload(payload: &Value) -> Option<String> {
    payload
        .pointer("/sender/login")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
