use sqlx::{Connection, PgPool};

use rbac0_application::Rbac0Controller;
use rbac0_core::AppError;
use rbac0_domain::{ActionId, CreateRoleInput, ObjectId, Permission, RoleId, RolePerms};

use super::PostgresAccessController;
use crate::test_support::{test_pool, unique_name};

async fn create_role(pool: &PgPool, permissions: &[Permission]) -> RolePerms {
    let Ok(mut connection) = pool.acquire().await else {
        panic!("failed to acquire connection");
    };
    let input = CreateRoleInput::new(
        RoleId::UNASSIGNED,
        1,
        unique_name("access"),
        "access backend role",
        false,
        permissions,
    )
    .unwrap_or_else(|_| unreachable!());

    match PostgresAccessController::new()
        .create_role(&mut connection, input)
        .await
    {
        Ok(role) => role,
        Err(error) => panic!("failed to create role: {error}"),
    }
}

async fn grant_rows(pool: &PgPool, role_id: RoleId) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rbac0_role_perms WHERE role_id = $1")
        .bind(role_id.to_storage())
        .fetch_one(pool)
        .await
        .unwrap_or_default()
}

#[tokio::test]
async fn revoke_only_touches_the_given_role() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let shared = Permission::new("ledger", "read");
    let first = create_role(&pool, std::slice::from_ref(&shared)).await;
    let second = create_role(&pool, std::slice::from_ref(&shared)).await;

    let controller = PostgresAccessController::new();
    let Ok(mut connection) = pool.acquire().await else {
        panic!("failed to acquire connection");
    };
    let revoke = controller
        .revoke_role_perms(
            &mut connection,
            first.info.role_id,
            std::slice::from_ref(&shared),
        )
        .await;
    assert!(revoke.is_ok());

    let first_check = controller
        .check_perm(
            &mut connection,
            first.info.role_id,
            &ObjectId::from("ledger"),
            &ActionId::from("read"),
        )
        .await;
    let second_check = controller
        .check_perm(
            &mut connection,
            second.info.role_id,
            &ObjectId::from("ledger"),
            &ActionId::from("read"),
        )
        .await;

    assert!(first_check.is_ok_and(|check| !check.allowed));
    assert!(second_check.is_ok_and(|check| check.allowed));
}

#[tokio::test]
async fn concurrent_identical_grants_store_one_row() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let role = create_role(&pool, &[]).await;
    let role_id = role.info.role_id;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut connection = pool.acquire().await.map_err(|error| error.to_string())?;
            PostgresAccessController::new()
                .grant_role_perms(
                    &mut connection,
                    role_id,
                    &[Permission::new("invoice", "approve")],
                )
                .await
                .map_err(|error| error.to_string())
        }));
    }

    for task in tasks {
        assert!(matches!(task.await, Ok(Ok(()))));
    }
    assert_eq!(grant_rows(&pool, role_id).await, 1);
}

#[tokio::test]
async fn operations_compose_into_caller_transaction() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let role = create_role(&pool, &[]).await;
    let role_id = role.info.role_id;
    let controller = PostgresAccessController::new();

    let Ok(mut connection) = pool.acquire().await else {
        panic!("failed to acquire connection");
    };
    let Ok(mut transaction) = connection.begin().await else {
        panic!("failed to begin transaction");
    };
    let grant = controller
        .grant_role_perms(
            &mut transaction,
            role_id,
            &[Permission::new("report", "export")],
        )
        .await;
    assert!(grant.is_ok());

    let inside = controller
        .check_perm(
            &mut transaction,
            role_id,
            &ObjectId::from("report"),
            &ActionId::from("export"),
        )
        .await;
    assert!(inside.is_ok_and(|check| check.allowed));
    assert!(transaction.rollback().await.is_ok());

    let after = controller
        .check_perm(
            &mut connection,
            role_id,
            &ObjectId::from("report"),
            &ActionId::from("export"),
        )
        .await;
    assert!(after.is_ok_and(|check| !check.allowed));
}

#[tokio::test]
async fn failed_create_leaves_no_grants_behind() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let existing = create_role(&pool, &[]).await;
    let controller = PostgresAccessController::new();
    let Ok(mut connection) = pool.acquire().await else {
        panic!("failed to acquire connection");
    };

    let duplicate = CreateRoleInput::new(
        RoleId::UNASSIGNED,
        1,
        existing.info.name.clone(),
        "",
        false,
        &[Permission::new("o1", "a1")],
    )
    .unwrap_or_else(|_| unreachable!());
    let result = controller.create_role(&mut connection, duplicate).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(grant_rows(&pool, existing.info.role_id).await, 0);
}
