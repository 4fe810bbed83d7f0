//! Application services and ports.

#![forbid(unsafe_code)]

mod filter_controller;
mod realtime_synchronizer;
mod webhook_ports;
mod webhook_query;
mod webhook_service;

pub use filter_controller::{DateRangePatch, FilterController, FilterPatch};
pub use realtime_synchronizer::{ConnectionStatus, RealtimeSynchronizer, ViewSnapshot};
pub use webhook_ports::{
    RawWebhookChange, WebhookChangeFeed, WebhookRepository, WebhookSubscription, WebhookUpdate,
};
pub use webhook_query::{
    INITIAL_FETCH_LIMIT, WebhookColumn, WebhookCondition, WebhookQuery,
};
pub use webhook_service::{
    DEFAULT_LIST_LIMIT, InboundDelivery, MAX_LIST_LIMIT, WebhookService,
};
