use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hookscope_application::{DateRangePatch, FilterPatch};
use hookscope_core::{AppError, AppResult};
use hookscope_domain::FilterField;

/// One line typed into the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    /// `<key>=<value>`: change one filter clause.
    Apply(FilterPatch),
    /// `clear`: reset every clause.
    Clear,
    /// `values <field>`: list distinct values of a filter field.
    Values(FilterField),
    /// `show`: log the current filter and view.
    Show,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> AppResult<Option<MonitorCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some((key, value)) = line.split_once('=') {
        return parse_assignment(key.trim(), value).map(|patch| Some(MonitorCommand::Apply(patch)));
    }

    let mut words = line.split_whitespace();
    let command = match (words.next(), words.next(), words.next()) {
        (Some("clear"), None, None) => MonitorCommand::Clear,
        (Some("show"), None, None) => MonitorCommand::Show,
        (Some("values"), Some(field), None) => {
            MonitorCommand::Values(FilterField::parse_transport(field)?)
        }
        _ => {
            return Err(AppError::Validation(format!(
                "unrecognized command '{line}'; expected clear, show, values <field> or <key>=<value>"
            )));
        }
    };

    Ok(Some(command))
}

/// Builds the patch for one `key=value` clause. An empty value clears the clause.
pub fn parse_assignment(key: &str, value: &str) -> AppResult<FilterPatch> {
    let value = value.trim();

    let patch = match key {
        "event_types" => FilterPatch {
            event_types: Some(parse_list(value)),
            ..FilterPatch::default()
        },
        "repositories" => FilterPatch {
            repositories: Some(parse_list(value)),
            ..FilterPatch::default()
        },
        "senders" => FilterPatch {
            senders: Some(parse_list(value)),
            ..FilterPatch::default()
        },
        "since" => FilterPatch {
            date_range: Some(DateRangePatch {
                start: Some(parse_bound(key, value)?),
                end: None,
            }),
            ..FilterPatch::default()
        },
        "until" => FilterPatch {
            date_range: Some(DateRangePatch {
                start: None,
                end: Some(parse_bound(key, value)?),
            }),
            ..FilterPatch::default()
        },
        "github_id" => FilterPatch {
            github_id: Some(optional_text(value)),
            ..FilterPatch::default()
        },
        "workflow_id" => FilterPatch {
            workflow_id: Some(optional_text(value)),
            ..FilterPatch::default()
        },
        other => {
            return Err(AppError::Validation(format!(
                "unknown filter clause '{other}'"
            )));
        }
    };

    Ok(patch)
}

fn parse_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_bound(key: &str, value: &str) -> AppResult<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }

    DateTime::parse_from_rfc3339(value)
        .map(|bound| Some(bound.with_timezone(&Utc)))
        .map_err(|error| AppError::Validation(format!("invalid {key} timestamp '{value}': {error}")))
}

fn optional_text(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
