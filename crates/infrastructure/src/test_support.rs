use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use rbac0_domain::RoleId;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for rbac0 tests: {error}");
    }

    Some(pool)
}

fn unique_suffix() -> u64 {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or_default();
    nanos.wrapping_add(SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}-{}", std::process::id(), unique_suffix())
}

/// Explicit role id far above store-assigned ones.
pub(crate) fn unique_role_id() -> RoleId {
    let offset = u32::try_from(unique_suffix() % 1_000_000_000).unwrap_or_default();
    RoleId::new(3_000_000_000 + offset)
}
