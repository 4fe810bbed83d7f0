//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_webhook_repository;
mod postgres_webhook_change_feed;
mod postgres_webhook_repository;

pub use in_memory_webhook_repository::InMemoryWebhookRepository;
pub use postgres_webhook_change_feed::{PostgresWebhookChangeFeed, WEBHOOK_CHANGES_CHANNEL};
pub use postgres_webhook_repository::PostgresWebhookRepository;
