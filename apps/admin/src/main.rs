//! RBAC0 administration CLI.

#![forbid(unsafe_code)]

mod admin_command;
mod admin_config;

use std::env;
use std::sync::Arc;

use rbac0_application::{PolicyEngine, Rbac0Slot};
use rbac0_core::{AppError, AppResult};
use rbac0_infrastructure::{
    CasbinController, CasbinPolicyEngine, PolicyReloadHandle, PolicyReloader,
    PostgresAccessController, PostgresConnectionSource, PostgresRbac0Service, connect_and_migrate,
};
use sqlx::PgPool;
use tracing::info;

use crate::admin_command::AdminCommand;
use crate::admin_config::{AdminConfig, BackendKind, init_tracing};

static RBAC0: Rbac0Slot<PostgresConnectionSource> = Rbac0Slot::new();

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = env::args().skip(1).collect::<Vec<_>>();
    let command = AdminCommand::parse(&args)?;
    let config = AdminConfig::load()?;

    let pool = connect_and_migrate(config.database_url.as_str(), config.max_connections).await?;
    if command == AdminCommand::Migrate {
        info!("database migrations applied");
        return Ok(());
    }

    let reloader = install_backend(&config, pool).await?;
    let service = RBAC0.service()?;
    info!(backend = service.backend_name(), "rbac0-admin started");

    let output = command.run(service).await;
    if let Some(reloader) = reloader {
        reloader.shutdown().await?;
    }

    let output = serde_json::to_string_pretty(&output?)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{output}");

    Ok(())
}

async fn install_backend(
    config: &AdminConfig,
    pool: PgPool,
) -> AppResult<Option<PolicyReloadHandle>> {
    match config.backend {
        BackendKind::Access => {
            RBAC0.install(PostgresRbac0Service::new(
                PostgresConnectionSource::new(pool),
                Arc::new(PostgresAccessController::new()),
            ))?;
            Ok(None)
        }
        BackendKind::Casbin => {
            let engine: Arc<dyn PolicyEngine> =
                Arc::new(CasbinPolicyEngine::with_pool(pool.clone()).await?);
            let reloader = PolicyReloader::new(Arc::clone(&engine), config.policy_reload).spawn();

            RBAC0.install(PostgresRbac0Service::new(
                PostgresConnectionSource::new(pool),
                Arc::new(CasbinController::new(engine)),
            ))?;
            Ok(Some(reloader))
        }
    }
}
