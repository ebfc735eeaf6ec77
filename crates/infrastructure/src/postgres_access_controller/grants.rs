use std::collections::HashMap;

use sqlx::{FromRow, PgConnection};

use rbac0_core::{AppError, AppResult};
use rbac0_domain::{ActionId, ObjectId, Permission, RoleId};

#[derive(Debug, FromRow)]
struct GrantRow {
    role_id: i64,
    object: String,
    action: String,
}

fn split_permissions(permissions: &[Permission]) -> (Vec<String>, Vec<String>) {
    permissions
        .iter()
        .map(|permission| {
            (
                permission.object.as_str().to_owned(),
                permission.action.as_str().to_owned(),
            )
        })
        .unzip()
}

pub(super) async fn has_grant(
    connection: &mut PgConnection,
    role_id: RoleId,
    object: &ObjectId,
    action: &ActionId,
) -> AppResult<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM rbac0_role_perms
            WHERE role_id = $1 AND object = $2 AND action = $3
        )
        "#,
    )
    .bind(role_id.to_storage())
    .bind(object.as_str())
    .bind(action.as_str())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Store(format!(
            "failed to check grant for role '{role_id}': {error}"
        ))
    })
}

pub(super) async fn insert_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
    permissions: &[Permission],
) -> AppResult<u64> {
    let (objects, actions) = split_permissions(permissions);

    let result = sqlx::query(
        r#"
        INSERT INTO rbac0_role_perms (role_id, object, action)
        SELECT $1, granted.object, granted.action
        FROM UNNEST($2::TEXT[], $3::TEXT[]) AS granted (object, action)
        ON CONFLICT (role_id, object, action) DO NOTHING
        "#,
    )
    .bind(role_id.to_storage())
    .bind(objects)
    .bind(actions)
    .execute(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Store(format!(
            "failed to persist grants for role '{role_id}': {error}"
        ))
    })?;

    Ok(result.rows_affected())
}

pub(super) async fn delete_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
    permissions: &[Permission],
) -> AppResult<u64> {
    let (objects, actions) = split_permissions(permissions);

    let result = sqlx::query(
        r#"
        DELETE FROM rbac0_role_perms AS grants
        USING UNNEST($2::TEXT[], $3::TEXT[]) AS revoked (object, action)
        WHERE grants.role_id = $1
            AND grants.object = revoked.object
            AND grants.action = revoked.action
        "#,
    )
    .bind(role_id.to_storage())
    .bind(objects)
    .bind(actions)
    .execute(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Store(format!(
            "failed to revoke grants from role '{role_id}': {error}"
        ))
    })?;

    Ok(result.rows_affected())
}

pub(super) async fn delete_all_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM rbac0_role_perms
        WHERE role_id = $1
        "#,
    )
    .bind(role_id.to_storage())
    .execute(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Store(format!(
            "failed to clean grants of role '{role_id}': {error}"
        ))
    })?;

    Ok(result.rows_affected())
}

/// Loads the grants of every listed role, in grant order.
pub(super) async fn load_grants(
    connection: &mut PgConnection,
    role_ids: &[RoleId],
) -> AppResult<HashMap<RoleId, Vec<Permission>>> {
    if role_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids = role_ids
        .iter()
        .map(|role_id| role_id.to_storage())
        .collect::<Vec<_>>();

    let rows = sqlx::query_as::<_, GrantRow>(
        r#"
        SELECT role_id, object, action
        FROM rbac0_role_perms
        WHERE role_id = ANY($1)
        ORDER BY role_id, id
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *connection)
    .await
    .map_err(|error| AppError::Store(format!("failed to load role grants: {error}")))?;

    let mut grants: HashMap<RoleId, Vec<Permission>> = HashMap::new();
    for row in rows {
        grants
            .entry(RoleId::from_storage(row.role_id)?)
            .or_default()
            .push(Permission::new(row.object, row.action));
    }

    Ok(grants)
}
