mod grants;

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, info};

use rbac0_application::Rbac0Controller;
use rbac0_core::AppResult;
use rbac0_domain::{
    ActionId, CreateRoleInput, ObjectId, PermCheck, Permission, RoleId, RoleInfo, RoleListQuery,
    RolePage, RolePerms, SortOrder, dedup_permissions,
};

use crate::PostgresRoleStore;
use crate::database::{begin, commit};

/// Backend that keeps grants in a relational table next to the roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAccessController {
    store: PostgresRoleStore,
}

impl PostgresAccessController {
    /// Backend name reported in logs.
    pub const BACKEND_NAME: &'static str = "access";

    /// Creates the backend; the schema must already be migrated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: PostgresRoleStore::new(),
        }
    }
}

#[async_trait]
impl Rbac0Controller for PostgresAccessController {
    type Connection = PgConnection;

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    async fn check_perm(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        object: &ObjectId,
        action: &ActionId,
    ) -> AppResult<PermCheck> {
        let mut transaction = begin(connection).await?;

        let state = self.store.role_state(&mut transaction, role_id).await?;
        let check = match PermCheck::from_role_state(state.enabled, state.is_admin) {
            Some(check) => check,
            None => PermCheck::from_grant(
                grants::has_grant(&mut transaction, role_id, object, action).await?,
            ),
        };

        commit(transaction).await?;

        debug!(
            role_id = %role_id,
            object = %object,
            action = %action,
            allowed = check.allowed,
            "permission checked"
        );
        Ok(check)
    }

    async fn create_role(
        &self,
        connection: &mut PgConnection,
        input: CreateRoleInput,
    ) -> AppResult<RolePerms> {
        let mut transaction = begin(connection).await?;

        let info = self.store.insert_role(&mut transaction, &input).await?;
        if !input.permissions().is_empty() {
            grants::insert_grants(&mut transaction, info.role_id, input.permissions()).await?;
        }

        commit(transaction).await?;

        info!(
            role_id = %info.role_id,
            name = %info.name,
            is_admin = info.is_admin,
            permissions = input.permissions().len(),
            "role created"
        );
        Ok(RolePerms::new(info, input.permissions().to_vec()))
    }

    async fn update_role(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<()> {
        self.store
            .update_role(connection, role_id, name, description)
            .await?;

        info!(role_id = %role_id, "role updated");
        Ok(())
    }

    async fn delete_role(&self, connection: &mut PgConnection, role_id: RoleId) -> AppResult<()> {
        let mut transaction = begin(connection).await?;

        let revoked = grants::delete_all_grants(&mut transaction, role_id).await?;
        let existed = self.store.delete_role(&mut transaction, role_id).await?;

        commit(transaction).await?;

        if existed {
            info!(role_id = %role_id, revoked, "role deleted");
        }
        Ok(())
    }

    async fn list_role_info(
        &self,
        connection: &mut PgConnection,
        query: &RoleListQuery,
    ) -> AppResult<RolePage<RoleInfo>> {
        let mut transaction = begin(connection).await?;
        let page = self.store.list_roles(&mut transaction, query).await?;
        commit(transaction).await?;

        Ok(page)
    }

    async fn get_role_info(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<RoleInfo> {
        self.store.get_role(connection, role_id).await
    }

    async fn get_role_infos(
        &self,
        connection: &mut PgConnection,
        role_ids: &[RoleId],
        order: SortOrder,
    ) -> AppResult<Vec<RoleInfo>> {
        self.store.get_roles(connection, role_ids, order).await
    }

    async fn list_role_perms(
        &self,
        connection: &mut PgConnection,
        query: &RoleListQuery,
    ) -> AppResult<RolePage<RolePerms>> {
        let mut transaction = begin(connection).await?;

        let page = self.store.list_roles(&mut transaction, query).await?;
        let role_ids = page
            .items
            .iter()
            .map(|info| info.role_id)
            .collect::<Vec<_>>();
        let mut permissions_by_role = grants::load_grants(&mut transaction, &role_ids).await?;

        commit(transaction).await?;

        let items = page
            .items
            .into_iter()
            .map(|info| {
                let permissions = permissions_by_role
                    .remove(&info.role_id)
                    .unwrap_or_default();
                RolePerms::new(info, permissions)
            })
            .collect();

        Ok(RolePage {
            items,
            total: page.total,
        })
    }

    async fn get_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<RolePerms> {
        let mut transaction = begin(connection).await?;

        let info = self.store.get_role(&mut transaction, role_id).await?;
        let permissions = grants::load_grants(&mut transaction, &[role_id])
            .await?
            .remove(&role_id)
            .unwrap_or_default();

        commit(transaction).await?;

        Ok(RolePerms::new(info, permissions))
    }

    async fn grant_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        if permissions.is_empty() {
            return Ok(());
        }

        let mut transaction = begin(connection).await?;

        let state = self.store.role_state(&mut transaction, role_id).await?;
        if state.is_admin {
            commit(transaction).await?;
            debug!(role_id = %role_id, "grant to admin role skipped");
            return Ok(());
        }

        let granted = grants::insert_grants(
            &mut transaction,
            role_id,
            &dedup_permissions(permissions),
        )
        .await?;

        commit(transaction).await?;

        info!(role_id = %role_id, granted, "role permissions granted");
        Ok(())
    }

    async fn revoke_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let mut transaction = begin(connection).await?;

        self.store.role_state(&mut transaction, role_id).await?;
        let revoked = if permissions.is_empty() {
            0
        } else {
            grants::delete_grants(&mut transaction, role_id, permissions).await?
        };

        commit(transaction).await?;

        info!(role_id = %role_id, revoked, "role permissions revoked");
        Ok(())
    }

    async fn clean_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<()> {
        let mut transaction = begin(connection).await?;

        self.store.role_state(&mut transaction, role_id).await?;
        let revoked = grants::delete_all_grants(&mut transaction, role_id).await?;

        commit(transaction).await?;

        info!(role_id = %role_id, revoked, "role permissions cleaned");
        Ok(())
    }

    async fn enable_role(&self, connection: &mut PgConnection, role_id: RoleId) -> AppResult<()> {
        self.store.set_enabled(connection, role_id, true).await?;

        info!(role_id = %role_id, "role enabled");
        Ok(())
    }

    async fn disable_role(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.store.set_enabled(connection, role_id, false).await?;

        info!(role_id = %role_id, "role disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
