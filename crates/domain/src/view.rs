use hookscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FilterSpec, WebhookRecord};

/// Maximum number of records retained by a live view.
pub const VIEW_CAPACITY: usize = 100;

/// Kind of row change reported by a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeKind {
    /// Parses transport value into a change kind. Trigger operation names are accepted too.
    pub fn parse_transport(value: &str) -> AppResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown change kind '{value}'"
            ))),
        }
    }

    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Validated change event applied to a view.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookChange {
    /// New row image of an inserted record.
    Insert(WebhookRecord),
    /// New row image of an updated record.
    Update(WebhookRecord),
    /// Identifier of a deleted record.
    Delete {
        /// Identifier taken from the old row image.
        id: String,
    },
}

impl WebhookChange {
    /// Builds a change from raw row images.
    ///
    /// Fails when the image required by `kind` is missing or malformed.
    pub fn from_row_images(
        kind: ChangeKind,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> AppResult<Self> {
        match kind {
            ChangeKind::Insert => Ok(Self::Insert(WebhookRecord::from_row_image(
                required_image(new, kind)?,
            )?)),
            ChangeKind::Update => Ok(Self::Update(WebhookRecord::from_row_image(
                required_image(new, kind)?,
            )?)),
            ChangeKind::Delete => {
                let id = required_image(old, kind)?
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation("delete change is missing the old row id".to_owned())
                    })?;

                Ok(Self::Delete { id: id.to_owned() })
            }
        }
    }

    /// Returns the identifier of the affected record.
    #[must_use]
    pub fn record_id(&self) -> &str {
        match self {
            Self::Insert(record) | Self::Update(record) => record.id(),
            Self::Delete { id } => id.as_str(),
        }
    }
}

fn required_image(image: Option<&Value>, kind: ChangeKind) -> AppResult<&Value> {
    image.filter(|value| !value.is_null()).ok_or_else(|| {
        AppError::Validation(format!("{} change is missing its row image", kind.as_str()))
    })
}

/// Ordered, capped list of records shown by a live view, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    records: Vec<WebhookRecord>,
}

impl ViewState {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a view from records already ordered newest first.
    #[must_use]
    pub fn from_records(mut records: Vec<WebhookRecord>) -> Self {
        records.truncate(VIEW_CAPACITY);
        Self { records }
    }

    /// Returns the records in display order.
    #[must_use]
    pub fn records(&self) -> &[WebhookRecord] {
        self.records.as_slice()
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the view holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Applies one change under the given filter and returns whether the view changed.
    pub fn apply(&mut self, spec: &FilterSpec, change: WebhookChange) -> bool {
        match change {
            WebhookChange::Insert(record) => {
                if !spec.matches(&record) {
                    return false;
                }

                self.remove(record.id());
                self.records.insert(0, record);
                self.records.truncate(VIEW_CAPACITY);
                true
            }
            WebhookChange::Update(record) => {
                if !spec.matches(&record) {
                    return self.remove(record.id());
                }

                match self
                    .records
                    .iter_mut()
                    .find(|existing| existing.id() == record.id())
                {
                    Some(existing) => {
                        *existing = record;
                        true
                    }
                    None => false,
                }
            }
            WebhookChange::Delete { id } => self.remove(id.as_str()),
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id() != id);
        self.records.len() != before
    }
}
