use std::env;

use hookscope_application::FilterPatch;
use hookscope_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

use crate::filter_command::parse_assignment;

const FILTER_ENV_VARS: [(&str, &str); 7] = [
    ("MONITOR_EVENT_TYPES", "event_types"),
    ("MONITOR_REPOSITORIES", "repositories"),
    ("MONITOR_SENDERS", "senders"),
    ("MONITOR_SINCE", "since"),
    ("MONITOR_UNTIL", "until"),
    ("MONITOR_GITHUB_ID", "github_id"),
    ("MONITOR_WORKFLOW_ID", "workflow_id"),
];

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub database_url: String,
    /// Initial filter clauses, applied in order.
    pub filter_patches: Vec<FilterPatch>,
}

impl MonitorConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_non_empty_env("DATABASE_URL")?;
        let filter_patches = filter_patches_from(|name| env::var(name).ok())?;

        Ok(Self {
            database_url,
            filter_patches,
        })
    }
}

fn filter_patches_from(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Vec<FilterPatch>> {
    FILTER_ENV_VARS
        .iter()
        .filter_map(|&(name, key)| lookup(name).map(|value| (name, key, value)))
        .map(|(name, key, value)| {
            parse_assignment(key, value.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid {name}: {error}"))
            })
        })
        .collect()
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    let value = env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use hookscope_application::FilterPatch;

    use super::filter_patches_from;

    #[test]
    fn reads_only_the_variables_that_are_set() {
        let vars = BTreeMap::from([
            ("MONITOR_EVENT_TYPES", "push,workflow_run"),
            ("MONITOR_WORKFLOW_ID", "42"),
        ]);

        let patches = filter_patches_from(|name| vars.get(name).map(|value| (*value).to_owned()))
            .unwrap_or_default();

        assert_eq!(
            patches,
            vec![
                FilterPatch {
                    event_types: Some(BTreeSet::from([
                        "push".to_owned(),
                        "workflow_run".to_owned(),
                    ])),
                    ..FilterPatch::default()
                },
                FilterPatch {
                    workflow_id: Some(Some("42".to_owned())),
                    ..FilterPatch::default()
                },
            ]
        );
    }

    #[test]
    fn names_the_offending_variable() {
        let error = filter_patches_from(|name| {
            (name == "MONITOR_SINCE").then(|| "last tuesday".to_owned())
        })
        .err()
        .map(|error| error.to_string())
        .unwrap_or_default();

        assert!(error.contains("MONITOR_SINCE"));
    }
}
