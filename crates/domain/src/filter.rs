use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hookscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WebhookRecord;

/// Payload member holding the workflow identifier.
pub const WORKFLOW_ID_PAYLOAD_FIELD: &str = "workflow_id";

/// Optional inclusive creation-time bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

/// Filter applied to the live webhook view.
///
/// Empty allow-lists leave the corresponding field unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Allowed event types.
    pub event_types: BTreeSet<String>,
    /// Allowed repository full names. Records without a repository always pass.
    pub repositories: BTreeSet<String>,
    /// Allowed sender logins. Records without a sender always pass.
    pub senders: BTreeSet<String>,
    /// Creation-time bounds.
    pub date_range: DateRange,
    /// Case-insensitive delivery id substring.
    pub github_id: Option<String>,
    /// Exact workflow id drawn from the payload.
    pub workflow_id: Option<String>,
}

impl FilterSpec {
    /// Returns the delivery id needle when one is set and not blank.
    #[must_use]
    pub fn github_id_needle(&self) -> Option<&str> {
        self.github_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns the workflow id filter when one is set and not blank.
    #[must_use]
    pub fn workflow_id_value(&self) -> Option<&str> {
        self.workflow_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns whether no clause is active.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.event_types.is_empty()
            && self.repositories.is_empty()
            && self.senders.is_empty()
            && self.date_range.start.is_none()
            && self.date_range.end.is_none()
            && self.github_id_needle().is_none()
            && self.workflow_id_value().is_none()
    }

    /// Returns whether the record belongs to a view filtered by this spec.
    #[must_use]
    pub fn matches(&self, record: &WebhookRecord) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(record.event_type()) {
            return false;
        }

        if !allows_optional(&self.repositories, record.repository()) {
            return false;
        }

        if !allows_optional(&self.senders, record.sender()) {
            return false;
        }

        if self
            .date_range
            .start
            .is_some_and(|start| record.created_at() < start)
        {
            return false;
        }

        if self
            .date_range
            .end
            .is_some_and(|end| record.created_at() > end)
        {
            return false;
        }

        if let Some(needle) = self.github_id_needle()
            && !record
                .github_id()
                .to_ascii_lowercase()
                .contains(needle.to_ascii_lowercase().as_str())
        {
            return false;
        }

        if let Some(workflow_id) = self.workflow_id_value()
            && payload_workflow_id(record.payload()).as_deref() != Some(workflow_id)
        {
            return false;
        }

        true
    }
}

fn allows_optional(allowed: &BTreeSet<String>, value: Option<&str>) -> bool {
    match value {
        Some(value) if !allowed.is_empty() => allowed.contains(value),
        _ => true,
    }
}

/// Extracts the workflow id of a payload.
#[must_use]
pub fn payload_workflow_id(payload: &Value) -> Option<String> {
    payload_text_field(payload, WORKFLOW_ID_PAYLOAD_FIELD)
}

/// Reads a top-level payload member as text.
///
/// Strings are taken as-is and integers are rendered in decimal; any other
/// shape counts as absent.
#[must_use]
pub fn payload_text_field(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        _ => None,
    }
}

/// Filterable field whose distinct values can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// GitHub event type.
    EventType,
    /// Repository full name.
    Repository,
    /// Sender login.
    Sender,
    /// Workflow id drawn from the payload.
    WorkflowId,
}

impl FilterField {
    /// Every supported field.
    pub const ALL: [Self; 4] = [
        Self::EventType,
        Self::Repository,
        Self::Sender,
        Self::WorkflowId,
    ];

    /// Parses transport value into a filter field.
    pub fn parse_transport(value: &str) -> AppResult<Self> {
        match value {
            "event_types" => Ok(Self::EventType),
            "repositories" => Ok(Self::Repository),
            "senders" => Ok(Self::Sender),
            "workflow_ids" => Ok(Self::WorkflowId),
            _ => Err(AppError::Validation(format!(
                "unknown filter field '{value}'"
            ))),
        }
    }

    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventType => "event_types",
            Self::Repository => "repositories",
            Self::Sender => "senders",
            Self::WorkflowId => "workflow_ids",
        }
    }

    /// Reads this field from a record.
    #[must_use]
    pub fn value_of(&self, record: &WebhookRecord) -> Option<String> {
        match self {
            Self::EventType => Some(record.event_type().to_owned()),
            Self::Repository => record.repository().map(str::to_owned),
            Self::Sender => record.sender().map(str::to_owned),
            Self::WorkflowId => payload_workflow_id(record.payload()),
        }
    }
}

impl FromStr for FilterField {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_transport(value)
    }
}
