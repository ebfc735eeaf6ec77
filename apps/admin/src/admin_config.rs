use std::env;
use std::str::FromStr;
use std::time::Duration;

use rbac0_core::{AppError, AppResult};
use rbac0_infrastructure::PolicyReloadConfig;
use tracing_subscriber::EnvFilter;

/// Backend selected through `RBAC0_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Grants stored in a relational table.
    Access,
    /// Grants delegated to the casbin policy engine.
    Casbin,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "access" => Ok(Self::Access),
            "casbin" => Ok(Self::Casbin),
            other => Err(AppError::InvalidArgument(format!(
                "RBAC0_BACKEND must be either 'access' or 'casbin', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub backend: BackendKind,
    pub policy_reload: PolicyReloadConfig,
}

impl AdminConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::InvalidArgument("DATABASE_URL is required".to_owned()))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse::<u32>().map_err(|error| {
                AppError::InvalidArgument(format!("invalid DATABASE_MAX_CONNECTIONS: {error}"))
            })?,
            None => 10,
        };
        if max_connections == 0 {
            return Err(AppError::InvalidArgument(
                "DATABASE_MAX_CONNECTIONS must be positive".to_owned(),
            ));
        }

        let backend = lookup("RBAC0_BACKEND")
            .map(|value| value.parse::<BackendKind>())
            .transpose()?
            .unwrap_or(BackendKind::Access);

        let policy_reload = match lookup("RBAC0_POLICY_RELOAD_INTERVAL_MS") {
            Some(value) => {
                let millis = value.parse::<u64>().map_err(|error| {
                    AppError::InvalidArgument(format!(
                        "invalid RBAC0_POLICY_RELOAD_INTERVAL_MS: {error}"
                    ))
                })?;
                PolicyReloadConfig::new(Duration::from_millis(millis))?
            }
            None => PolicyReloadConfig::default(),
        };

        Ok(Self {
            database_url,
            max_connections,
            backend,
            policy_reload,
        })
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
