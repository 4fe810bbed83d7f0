use chrono::{DateTime, Utc};
use hookscope_domain::{
    FilterSpec, VIEW_CAPACITY, WORKFLOW_ID_PAYLOAD_FIELD, WebhookRecord, payload_text_field,
};

/// Row limit of the bulk read that seeds a live view.
pub const INITIAL_FETCH_LIMIT: usize = VIEW_CAPACITY;

/// Text column a store-level condition can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookColumn {
    /// `event_type`
    EventType,
    /// `repository`
    Repository,
    /// `sender`
    Sender,
    /// `github_id`
    GithubId,
}

impl WebhookColumn {
    /// Returns the column name used by record stores.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventType => "event_type",
            Self::Repository => "repository",
            Self::Sender => "sender",
            Self::GithubId => "github_id",
        }
    }

    /// Reads the column from a record.
    #[must_use]
    pub fn value_of<'a>(&self, record: &'a WebhookRecord) -> Option<&'a str> {
        match self {
            Self::EventType => Some(record.event_type()),
            Self::Repository => record.repository(),
            Self::Sender => record.sender(),
            Self::GithubId => Some(record.github_id()),
        }
    }
}

/// One store-level constraint. Conditions of a query are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookCondition {
    /// Column value is one of `values`; a null column passes when `include_null` is set.
    In {
        /// Target column.
        column: WebhookColumn,
        /// Allowed values.
        values: Vec<String>,
        /// Whether rows with a null column are kept.
        include_null: bool,
    },
    /// `created_at >= bound`.
    CreatedAtOnOrAfter(DateTime<Utc>),
    /// `created_at <= bound`.
    CreatedAtOnOrBefore(DateTime<Utc>),
    /// Column contains `needle`, ignoring case.
    ///
    /// Only ASCII letters fold; other characters must match exactly. The
    /// Postgres rendering uses the `C` collation so both sides agree.
    ContainsIgnoreCase {
        /// Target column.
        column: WebhookColumn,
        /// Substring to look for.
        needle: String,
    },
    /// Top-level payload member, read as text, equals `value`.
    PayloadFieldEquals {
        /// Payload member name.
        field: String,
        /// Expected text.
        value: String,
    },
}

impl WebhookCondition {
    /// Reference evaluation of the condition against one record.
    #[must_use]
    pub fn matches(&self, record: &WebhookRecord) -> bool {
        match self {
            Self::In {
                column,
                values,
                include_null,
            } => match column.value_of(record) {
                Some(value) => values.iter().any(|allowed| allowed == value),
                None => *include_null,
            },
            Self::CreatedAtOnOrAfter(bound) => record.created_at() >= *bound,
            Self::CreatedAtOnOrBefore(bound) => record.created_at() <= *bound,
            Self::ContainsIgnoreCase { column, needle } => column
                .value_of(record)
                .is_some_and(|value| {
                    value
                        .to_ascii_lowercase()
                        .contains(&needle.to_ascii_lowercase())
                }),
            Self::PayloadFieldEquals { field, value } => {
                payload_text_field(record.payload(), field).as_deref() == Some(value.as_str())
            }
        }
    }
}

/// Store query: ANDed conditions, newest first, bounded.
///
/// Rows are ordered by `created_at` descending and then by `id` descending so
/// equal timestamps still produce a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookQuery {
    conditions: Vec<WebhookCondition>,
    limit: usize,
}

impl WebhookQuery {
    /// Creates an unconstrained query returning at most `limit` rows.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            conditions: Vec::new(),
            limit,
        }
    }

    /// Adds one condition.
    #[must_use]
    pub fn with_condition(mut self, condition: WebhookCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Translates a filter into the initial-fetch query of a live view.
    #[must_use]
    pub fn from_filter_spec(spec: &FilterSpec) -> Self {
        let mut query = Self::new(INITIAL_FETCH_LIMIT);

        let allow_lists = [
            (WebhookColumn::EventType, &spec.event_types, false),
            (WebhookColumn::Repository, &spec.repositories, true),
            (WebhookColumn::Sender, &spec.senders, true),
        ];
        for (column, allowed, include_null) in allow_lists {
            if !allowed.is_empty() {
                query.conditions.push(WebhookCondition::In {
                    column,
                    values: allowed.iter().cloned().collect(),
                    include_null,
                });
            }
        }

        if let Some(start) = spec.date_range.start {
            query
                .conditions
                .push(WebhookCondition::CreatedAtOnOrAfter(start));
        }
        if let Some(end) = spec.date_range.end {
            query
                .conditions
                .push(WebhookCondition::CreatedAtOnOrBefore(end));
        }

        if let Some(needle) = spec.github_id_needle() {
            query.conditions.push(WebhookCondition::ContainsIgnoreCase {
                column: WebhookColumn::GithubId,
                needle: needle.to_owned(),
            });
        }

        if let Some(workflow_id) = spec.workflow_id_value() {
            query.conditions.push(WebhookCondition::PayloadFieldEquals {
                field: WORKFLOW_ID_PAYLOAD_FIELD.to_owned(),
                value: workflow_id.to_owned(),
            });
        }

        query
    }

    /// Query behind the list endpoint: optional exact event type.
    #[must_use]
    pub fn by_event_type(event_type: Option<&str>, limit: usize) -> Self {
        let query = Self::new(limit);
        match event_type {
            Some(event_type) => query.with_condition(WebhookCondition::In {
                column: WebhookColumn::EventType,
                values: vec![event_type.to_owned()],
                include_null: false,
            }),
            None => query,
        }
    }

    /// Returns the conditions.
    #[must_use]
    pub fn conditions(&self) -> &[WebhookCondition] {
        self.conditions.as_slice()
    }

    /// Returns the row limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns whether every condition holds for the record.
    #[must_use]
    pub fn matches(&self, record: &WebhookRecord) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(record))
    }
}
