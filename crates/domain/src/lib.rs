//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod filter;
mod stats;
mod view;
mod webhook;

pub use filter::{
    DateRange, FilterField, FilterSpec, WORKFLOW_ID_PAYLOAD_FIELD, payload_text_field,
    payload_workflow_id,
};
pub use stats::{RECENT_WINDOW_MINUTES, WebhookStats};
pub use view::{ChangeKind, VIEW_CAPACITY, ViewState, WebhookChange};
pub use webhook::{NewWebhook, UNKNOWN_EVENT_TYPE, WebhookRecord};
