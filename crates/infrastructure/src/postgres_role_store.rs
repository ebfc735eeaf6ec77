use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use rbac0_core::{AppError, AppResult, NonEmptyString};
use rbac0_domain::{CreateRoleInput, RoleId, RoleInfo, RoleListQuery, RolePage, SortOrder};

/// Enable and admin flags of a stored role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct RoleState {
    /// Whether the role is enabled.
    pub enabled: bool,
    /// Whether the role is an admin role.
    pub is_admin: bool,
}

/// PostgreSQL role table shared by every backend.
///
/// All methods run on the caller's connection and never open a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRoleStore;

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    enabled: bool,
    is_admin: bool,
    creator: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for RoleInfo {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role_id: RoleId::from_storage(row.id)?,
            enabled: row.enabled,
            is_admin: row.is_admin,
            creator: row.creator,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PostgresRoleStore {
    /// Creates a role store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the flags of a role, or `NotFound`.
    pub async fn role_state(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<RoleState> {
        sqlx::query_as::<_, RoleState>(
            r#"
            SELECT enabled, is_admin
            FROM rbac0_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.to_storage())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to load role '{role_id}': {error}")))?
        .ok_or_else(|| role_not_found(role_id))
    }

    /// Inserts a role and returns the stored record.
    ///
    /// An unassigned identifier is drawn from the identity sequence; an
    /// explicit one advances the sequence past it.
    pub async fn insert_role(
        &self,
        connection: &mut PgConnection,
        input: &CreateRoleInput,
    ) -> AppResult<RoleInfo> {
        let requested_id = (!input.role_id().is_unassigned()).then(|| input.role_id().to_storage());

        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            INSERT INTO rbac0_roles (id, enabled, is_admin, creator, name, description)
            VALUES (
                COALESCE($1, nextval(pg_get_serial_sequence('rbac0_roles', 'id'))),
                TRUE,
                $2,
                $3,
                $4,
                $5
            )
            RETURNING id, enabled, is_admin, creator, name, description, created_at, updated_at
            "#,
        )
        .bind(requested_id)
        .bind(input.is_admin())
        .bind(input.creator())
        .bind(input.name().as_str())
        .bind(input.description())
        .fetch_one(&mut *connection)
        .await
        .map_err(|error| map_role_conflict(error, input.role_id(), input.name().as_str()))?;

        if requested_id.is_some() {
            sqlx::query(
                r#"
                SELECT setval(
                    pg_get_serial_sequence('rbac0_roles', 'id'),
                    (SELECT MAX(id) FROM rbac0_roles)
                )
                "#,
            )
            .execute(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Store(format!("failed to advance role id sequence: {error}"))
            })?;
        }

        RoleInfo::try_from(row)
    }

    /// Updates the name and description of a role.
    pub async fn update_role(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<()> {
        let name = NonEmptyString::new(name)?;
        let result = sqlx::query(
            r#"
            UPDATE rbac0_roles
            SET name = $2, description = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(role_id.to_storage())
        .bind(name.as_str())
        .bind(description)
        .execute(&mut *connection)
        .await
        .map_err(|error| map_role_conflict(error, role_id, name.as_str()))?;

        if result.rows_affected() == 0 {
            return Err(role_not_found(role_id));
        }

        Ok(())
    }

    /// Deletes a role row and returns whether it existed.
    pub async fn delete_role(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM rbac0_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.to_storage())
        .execute(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete role '{role_id}': {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the enable flag of a role.
    pub async fn set_enabled(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        enabled: bool,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE rbac0_roles
            SET enabled = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(role_id.to_storage())
        .bind(enabled)
        .execute(&mut *connection)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to set enabled={enabled} on role '{role_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(role_not_found(role_id));
        }

        Ok(())
    }

    /// Returns one role record, or `NotFound`.
    pub async fn get_role(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<RoleInfo> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, enabled, is_admin, creator, name, description, created_at, updated_at
            FROM rbac0_roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.to_storage())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to load role '{role_id}': {error}")))?
        .ok_or_else(|| role_not_found(role_id))?;

        RoleInfo::try_from(row)
    }

    /// Returns the listed roles, or every role when the list is empty.
    ///
    /// Identifiers without a stored role are skipped.
    pub async fn get_roles(
        &self,
        connection: &mut PgConnection,
        role_ids: &[RoleId],
        order: SortOrder,
    ) -> AppResult<Vec<RoleInfo>> {
        let ids = role_ids
            .iter()
            .map(|role_id| role_id.to_storage())
            .collect::<Vec<_>>();

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, enabled, is_admin, creator, name, description, created_at, updated_at
            FROM rbac0_roles
            WHERE cardinality($1::BIGINT[]) = 0 OR id = ANY($1)
            ORDER BY CASE WHEN $2 THEN id END DESC, id ASC
            "#,
        )
        .bind(ids)
        .bind(order.is_descending())
        .fetch_all(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to load roles: {error}")))?;

        rows.into_iter().map(RoleInfo::try_from).collect()
    }

    /// Returns one filtered page of roles and the unpaginated match count.
    pub async fn list_roles(
        &self,
        connection: &mut PgConnection,
        query: &RoleListQuery,
    ) -> AppResult<RolePage<RoleInfo>> {
        let name_contains = query.name_contains.as_deref();
        let enabled = query.enable.required_flag();

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, enabled, is_admin, creator, name, description, created_at, updated_at
            FROM rbac0_roles
            WHERE ($1::TEXT IS NULL OR strpos(name, $1) > 0)
                AND ($2::BOOLEAN IS NULL OR enabled = $2)
            ORDER BY CASE WHEN $3 THEN id END DESC, id ASC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(name_contains)
        .bind(enabled)
        .bind(query.order.is_descending())
        .bind(query.offset_as_sql()?)
        .bind(query.limit.as_sql()?)
        .fetch_all(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to list roles: {error}")))?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM rbac0_roles
            WHERE ($1::TEXT IS NULL OR strpos(name, $1) > 0)
                AND ($2::BOOLEAN IS NULL OR enabled = $2)
            "#,
        )
        .bind(name_contains)
        .bind(enabled)
        .fetch_one(&mut *connection)
        .await
        .map_err(|error| AppError::Store(format!("failed to count roles: {error}")))?;

        let items = rows
            .into_iter()
            .map(RoleInfo::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(RolePage {
            items,
            total: u64::try_from(total).map_err(|error| {
                AppError::Internal(format!("invalid role count '{total}': {error}"))
            })?,
        })
    }
}

fn role_not_found(role_id: RoleId) -> AppError {
    AppError::NotFound(format!("role '{role_id}' does not exist"))
}

fn map_role_conflict(error: sqlx::Error, role_id: RoleId, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        if database_error.constraint() == Some("rbac0_roles_pkey") {
            return AppError::Conflict(format!("role '{role_id}' already exists"));
        }

        return AppError::Conflict(format!("role name '{role_name}' is already taken"));
    }

    AppError::Store(format!("failed to write role '{role_id}': {error}"))
}
