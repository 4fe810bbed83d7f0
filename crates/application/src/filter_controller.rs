use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hookscope_core::AppResult;
use hookscope_domain::{FilterField, FilterSpec};
use tracing::warn;

use crate::WebhookRepository;
use crate::webhook_service::normalize_distinct_values;

/// Per-bound change of the date range. `Some(None)` clears a bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRangePatch {
    /// New lower bound.
    pub start: Option<Option<DateTime<Utc>>>,
    /// New upper bound.
    pub end: Option<Option<DateTime<Utc>>>,
}

/// Partial filter change. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    /// Replacement event-type allow-list.
    pub event_types: Option<BTreeSet<String>>,
    /// Replacement repository allow-list.
    pub repositories: Option<BTreeSet<String>>,
    /// Replacement sender allow-list.
    pub senders: Option<BTreeSet<String>>,
    /// Date range change, merged per bound.
    pub date_range: Option<DateRangePatch>,
    /// New delivery id needle; `Some(None)` clears it.
    pub github_id: Option<Option<String>>,
    /// New workflow id; `Some(None)` clears it.
    pub workflow_id: Option<Option<String>>,
}

impl FilterPatch {
    fn apply_to(self, spec: &mut FilterSpec) {
        if let Some(event_types) = self.event_types {
            spec.event_types = event_types;
        }
        if let Some(repositories) = self.repositories {
            spec.repositories = repositories;
        }
        if let Some(senders) = self.senders {
            spec.senders = senders;
        }
        if let Some(date_range) = self.date_range {
            if let Some(start) = date_range.start {
                spec.date_range.start = start;
            }
            if let Some(end) = date_range.end {
                spec.date_range.end = end;
            }
        }
        if let Some(github_id) = self.github_id {
            spec.github_id = github_id;
        }
        if let Some(workflow_id) = self.workflow_id {
            spec.workflow_id = workflow_id;
        }
    }
}

/// Owns the current filter of a view and serves distinct values for filter inputs.
pub struct FilterController {
    repository: Arc<dyn WebhookRepository>,
    filter: FilterSpec,
}

impl FilterController {
    /// Creates a controller with an unrestricted filter.
    #[must_use]
    pub fn new(repository: Arc<dyn WebhookRepository>) -> Self {
        Self::with_filter(repository, FilterSpec::default())
    }

    /// Creates a controller starting from a given filter.
    #[must_use]
    pub fn with_filter(repository: Arc<dyn WebhookRepository>, filter: FilterSpec) -> Self {
        Self { repository, filter }
    }

    /// Returns the current filter.
    #[must_use]
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Merges a patch into the filter and returns whether it changed.
    pub fn set_filter(&mut self, patch: FilterPatch) -> bool {
        let mut next = self.filter.clone();
        patch.apply_to(&mut next);
        self.replace(next)
    }

    /// Resets every clause and returns whether the filter changed.
    pub fn clear(&mut self) -> bool {
        self.replace(FilterSpec::default())
    }

    /// Fetches the sorted distinct values of one field from the whole store.
    pub async fn distinct_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        let values = self
            .repository
            .distinct_values(field)
            .await
            .inspect_err(|error| {
                warn!(field = field.as_str(), error = %error, "distinct value lookup failed");
            })?;

        Ok(normalize_distinct_values(values))
    }

    fn replace(&mut self, next: FilterSpec) -> bool {
        if next == self.filter {
            return false;
        }

        self.filter = next;
        true
    }
}
