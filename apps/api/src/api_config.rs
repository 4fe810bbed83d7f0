use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use hookscope_core::AppError;
use tracing_subscriber::EnvFilter;

/// Record store the API writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    Memory,
}

impl StorageBackend {
    fn from_env() -> Result<Self, AppError> {
        match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_owned())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => Ok(Self::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            }),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Validation(format!(
                "STORAGE_BACKEND must be either 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage_backend: StorageBackend,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let storage_backend = StorageBackend::from_env()?;
        if migrate_only && storage_backend == StorageBackend::Memory {
            return Err(AppError::Validation(
                "migrate requires STORAGE_BACKEND=postgres".to_owned(),
            ));
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = match env::var("API_PORT") {
            Ok(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?,
            Err(_) => 3001,
        };

        Ok(Self {
            migrate_only,
            storage_backend,
            frontend_url,
            api_host,
            api_port,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::{ApiConfig, StorageBackend};

    fn config(api_host: &str) -> ApiConfig {
        ApiConfig {
            migrate_only: false,
            storage_backend: StorageBackend::Memory,
            frontend_url: "http://localhost:3000".to_owned(),
            api_host: api_host.to_owned(),
            api_port: 3001,
        }
    }

    #[test]
    fn socket_address_combines_host_and_port() {
        let address = config("0.0.0.0").socket_address();

        assert_eq!(
            address.ok(),
            "0.0.0.0:3001".parse::<SocketAddr>().ok()
        );
    }

    #[test]
    fn socket_address_rejects_hostnames() {
        assert!(config("localhost").socket_address().is_err());
    }
}
