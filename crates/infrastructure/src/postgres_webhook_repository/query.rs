use hookscope_application::{WebhookCondition, WebhookQuery};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::{FilterField, WORKFLOW_ID_PAYLOAD_FIELD, WebhookRecord};
use sqlx::{Postgres, QueryBuilder};

use super::{PostgresWebhookRepository, WEBHOOK_COLUMNS, WebhookRow, read_error};

impl PostgresWebhookRepository {
    pub(super) async fn query_webhooks_impl(
        &self,
        query: WebhookQuery,
    ) -> AppResult<Vec<WebhookRecord>> {
        let limit = i64::try_from(query.limit()).map_err(|error| {
            AppError::Validation(format!("invalid webhook query limit: {error}"))
        })?;

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE TRUE"));

        for condition in query.conditions() {
            builder.push(" AND ");
            push_webhook_condition(&mut builder, condition);
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);

        let rows = builder
            .build_query_as::<WebhookRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| read_error("query webhooks", error))?;

        rows.into_iter().map(WebhookRecord::try_from).collect()
    }

    pub(super) async fn distinct_values_impl(&self, field: FilterField) -> AppResult<Vec<String>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT DISTINCT value FROM (SELECT ");

        match field {
            FilterField::EventType => {
                builder.push("event_type");
            }
            FilterField::Repository => {
                builder.push("repository");
            }
            FilterField::Sender => {
                builder.push("sender");
            }
            FilterField::WorkflowId => {
                push_payload_text(&mut builder, WORKFLOW_ID_PAYLOAD_FIELD.to_owned());
            }
        }

        builder.push(
            " AS value FROM webhooks) observed WHERE value IS NOT NULL AND value <> '' ORDER BY value",
        );

        builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                read_error(
                    format!("list distinct {} values", field.as_str()).as_str(),
                    error,
                )
            })
    }
}

fn push_webhook_condition(builder: &mut QueryBuilder<'_, Postgres>, condition: &WebhookCondition) {
    match condition {
        WebhookCondition::In {
            column,
            values,
            include_null,
        } => {
            builder.push("(");
            builder.push(column.as_str());
            builder.push(" = ANY(");
            builder.push_bind(values.clone());
            builder.push(")");
            if *include_null {
                builder.push(" OR ");
                builder.push(column.as_str());
                builder.push(" IS NULL");
            }
            builder.push(")");
        }
        WebhookCondition::CreatedAtOnOrAfter(bound) => {
            builder.push("created_at >= ");
            builder.push_bind(*bound);
        }
        WebhookCondition::CreatedAtOnOrBefore(bound) => {
            builder.push("created_at <= ");
            builder.push_bind(*bound);
        }
        WebhookCondition::ContainsIgnoreCase { column, needle } => {
            // C collation keeps lower() to ASCII letters.
            builder.push("strpos(lower(");
            builder.push(column.as_str());
            builder.push(" COLLATE \"C\"), lower(CAST(");
            builder.push_bind(needle.clone());
            builder.push(" AS TEXT) COLLATE \"C\")) > 0");
        }
        WebhookCondition::PayloadFieldEquals { field, value } => {
            push_payload_text(builder, field.clone());
            builder.push(" = ");
            builder.push_bind(value.clone());
        }
    }
}

/// Top-level payload member as text: strings verbatim, integers in decimal, otherwise NULL.
fn push_payload_text(builder: &mut QueryBuilder<'_, Postgres>, field: String) {
    builder.push("(CASE jsonb_typeof(payload -> ");
    builder.push_bind(field.clone());
    builder.push(") WHEN 'string' THEN payload ->> ");
    builder.push_bind(field.clone());
    builder.push(" WHEN 'number' THEN CASE WHEN (payload ->> ");
    builder.push_bind(field.clone());
    builder.push(") ~ '^-?[0-9]+$' THEN payload ->> ");
    builder.push_bind(field);
    builder.push(" END END)");
}
