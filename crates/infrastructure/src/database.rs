use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};
use tracing::info;

use rbac0_application::{ConnectionSource, Rbac0Service};
use rbac0_core::{AppError, AppResult};

/// Pool-bound service over a PostgreSQL backend.
pub type PostgresRbac0Service = Rbac0Service<PostgresConnectionSource>;

/// Connection source borrowing from a PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresConnectionSource {
    pool: PgPool,
}

impl PostgresConnectionSource {
    /// Creates a source over the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionSource for PostgresConnectionSource {
    type Connection = PgConnection;
    type Lease = PoolConnection<Postgres>;

    async fn acquire(&self) -> AppResult<Self::Lease> {
        self.pool
            .acquire()
            .await
            .map_err(|error| AppError::Store(format!("failed to acquire connection: {error}")))
    }
}

/// Connects to PostgreSQL and applies the embedded migrations.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Store(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to run database migrations: {error}")))?;

    info!(max_connections, "database connected and migrated");
    Ok(pool)
}

/// Opens a transaction, or a savepoint when one is already open.
pub(crate) async fn begin(connection: &mut PgConnection) -> AppResult<Transaction<'_, Postgres>> {
    connection
        .begin()
        .await
        .map_err(|error| AppError::Store(format!("failed to begin transaction: {error}")))
}

pub(crate) async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Store(format!("failed to commit transaction: {error}")))
}
