use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::WebhookRecord;

/// Width of the trailing window counted by `recent_count`.
pub const RECENT_WINDOW_MINUTES: i64 = 60;

/// Summary counts derived from a webhook view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookStats {
    /// Number of records in the view.
    pub total: usize,
    /// Record count per event type.
    pub events: BTreeMap<String, usize>,
    /// Records created inside the trailing window.
    pub recent_count: usize,
}

impl WebhookStats {
    /// Aggregates the records against the current wall clock.
    #[must_use]
    pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a WebhookRecord>) -> Self {
        Self::aggregate_at(records, Utc::now())
    }

    /// Aggregates the records against an explicit reference time.
    #[must_use]
    pub fn aggregate_at<'a>(
        records: impl IntoIterator<Item = &'a WebhookRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let window_start = now - TimeDelta::minutes(RECENT_WINDOW_MINUTES);
        let mut stats = Self::default();

        for record in records {
            stats.total += 1;
            *stats
                .events
                .entry(record.event_type().to_owned())
                .or_default() += 1;
            if record.created_at() > window_start {
                stats.recent_count += 1;
            }
        }

        stats
    }
}
