use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, info, warn};

use rbac0_application::{PolicyEngine, PolicyRule, Rbac0Controller};
use rbac0_core::AppResult;
use rbac0_domain::{
    ActionId, CreateRoleInput, ObjectId, PermCheck, Permission, RoleId, RoleInfo, RoleListQuery,
    RolePage, RolePerms, SortOrder,
};

use crate::PostgresRoleStore;
use crate::database::{begin, commit};

/// Backend delegating grants to a policy engine.
///
/// Roles live in the shared role table; grants are engine rules keyed by the
/// decimal role identifier. Engine writes persist through the engine's own
/// adapter and are not part of the caller's transaction, so a new role first
/// drops any rules already stored under its identifier.
#[derive(Clone)]
pub struct CasbinController {
    store: PostgresRoleStore,
    engine: Arc<dyn PolicyEngine>,
}

impl CasbinController {
    /// Backend name reported in logs.
    pub const BACKEND_NAME: &'static str = "casbin";

    /// Creates the backend over a policy engine.
    #[must_use]
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            store: PostgresRoleStore::new(),
            engine,
        }
    }

    /// Returns the policy engine used by this backend.
    #[must_use]
    pub fn engine(&self) -> Arc<dyn PolicyEngine> {
        Arc::clone(&self.engine)
    }

    async fn role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        Ok(self
            .engine
            .rules_for_subject(&role_id.policy_subject())
            .await?
            .iter()
            .map(PolicyRule::permission)
            .collect())
    }

    fn rules(role_id: RoleId, permissions: &[Permission]) -> Vec<PolicyRule> {
        permissions
            .iter()
            .map(|permission| PolicyRule::for_role(role_id, permission))
            .collect()
    }
}

#[async_trait]
impl Rbac0Controller for CasbinController {
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
        let state = self.store.role_state(connection, role_id).await?;
        let check = match PermCheck::from_role_state(state.enabled, state.is_admin) {
            Some(check) => check,
            None => PermCheck::from_grant(
                self.engine
                    .enforce(&PolicyRule::request(role_id, object, action))
                    .await?,
            ),
        };

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
        // Rules left behind under this identifier belong to no committed role.
        let stale = self
            .engine
            .remove_subject(&info.role_id.policy_subject())
            .await?;
        if stale > 0 {
            warn!(role_id = %info.role_id, stale, "stale policies of new role removed");
        }

        let rules = Self::rules(info.role_id, input.permissions());
        if !rules.is_empty() {
            self.engine.add_rules(&rules).await?;
        }

        if let Err(error) = commit(transaction).await {
            if !rules.is_empty()
                && let Err(cleanup_error) = self.engine.remove_rules(&rules).await
            {
                warn!(
                    role_id = %info.role_id,
                    error = %cleanup_error,
                    "failed to remove policies of uncommitted role"
                );
            }
            return Err(error);
        }

        info!(
            role_id = %info.role_id,
            name = %info.name,
            is_admin = info.is_admin,
            permissions = rules.len(),
            "role created"
        );
        let permissions = self.role_permissions(info.role_id).await?;
        Ok(RolePerms::new(info, permissions))
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

        let revoked = self
            .engine
            .remove_subject(&role_id.policy_subject())
            .await?;
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
        let page = self.list_role_info(connection, query).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for info in page.items {
            let permissions = self.role_permissions(info.role_id).await?;
            items.push(RolePerms::new(info, permissions));
        }

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
        let info = self.store.get_role(connection, role_id).await?;
        let permissions = self.role_permissions(role_id).await?;

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

        let state = self.store.role_state(connection, role_id).await?;
        if state.is_admin {
            debug!(role_id = %role_id, "grant to admin role skipped");
            return Ok(());
        }

        let granted = self
            .engine
            .add_rules(&Self::rules(role_id, permissions))
            .await?;

        info!(role_id = %role_id, granted, "role permissions granted");
        Ok(())
    }

    async fn revoke_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        self.store.role_state(connection, role_id).await?;
        let revoked = self
            .engine
            .remove_rules(&Self::rules(role_id, permissions))
            .await?;

        info!(role_id = %role_id, revoked, "role permissions revoked");
        Ok(())
    }

    async fn clean_role_perms(
        &self,
        connection: &mut PgConnection,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.store.role_state(connection, role_id).await?;
        let revoked = self
            .engine
            .remove_subject(&role_id.policy_subject())
            .await?;

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
