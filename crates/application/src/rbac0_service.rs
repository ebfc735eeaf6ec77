use std::sync::Arc;

use rbac0_core::AppResult;
use rbac0_domain::{
    ActionId, CreateRoleInput, ObjectId, PermCheck, Permission, RoleId, RoleInfo, RoleListQuery,
    RolePage, RolePerms, SortOrder,
};

use crate::{ConnectionSource, Rbac0Controller};

/// Backend whose operations run against the connections of `S`.
pub type SourceController<S> =
    dyn Rbac0Controller<Connection = <S as ConnectionSource>::Connection>;

/// Source-bound entry point over an installed backend.
///
/// Each call borrows a connection from the source for its duration. Callers
/// composing several operations into one transaction use
/// [`Rbac0Service::controller`] with their own connection instead.
pub struct Rbac0Service<S: ConnectionSource> {
    source: S,
    controller: Arc<SourceController<S>>,
}

impl<S: ConnectionSource + Clone> Clone for Rbac0Service<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<S: ConnectionSource> Rbac0Service<S> {
    /// Creates a service over a connection source and a backend.
    #[must_use]
    pub fn new(source: S, controller: Arc<SourceController<S>>) -> Self {
        Self { source, controller }
    }

    /// Returns the connection-bound backend.
    #[must_use]
    pub fn controller(&self) -> &SourceController<S> {
        self.controller.as_ref()
    }

    /// Returns the backend name.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.controller.backend_name()
    }

    /// Checks one role against an (object, action) pair.
    pub async fn check_perm(
        &self,
        role_id: RoleId,
        object: &ObjectId,
        action: &ActionId,
    ) -> AppResult<PermCheck> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .check_perm(&mut *connection, role_id, object, action)
            .await
    }

    /// Returns true as soon as one of the roles is allowed.
    pub async fn check_perms(
        &self,
        role_ids: &[RoleId],
        object: &ObjectId,
        action: &ActionId,
    ) -> AppResult<bool> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .check_perms(&mut *connection, role_ids, object, action)
            .await
    }

    /// Creates a role together with its initial grants.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<RolePerms> {
        let mut connection = self.source.acquire().await?;
        self.controller.create_role(&mut *connection, input).await
    }

    /// Updates the name and description of a role.
    pub async fn update_role(
        &self,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .update_role(&mut *connection, role_id, name, description)
            .await
    }

    /// Deletes a role and its grants.
    pub async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller.delete_role(&mut *connection, role_id).await
    }

    /// Lists role records matching the query.
    pub async fn list_role_info(&self, query: &RoleListQuery) -> AppResult<RolePage<RoleInfo>> {
        let mut connection = self.source.acquire().await?;
        self.controller.list_role_info(&mut *connection, query).await
    }

    /// Returns one role record.
    pub async fn get_role_info(&self, role_id: RoleId) -> AppResult<RoleInfo> {
        let mut connection = self.source.acquire().await?;
        self.controller.get_role_info(&mut *connection, role_id).await
    }

    /// Returns the listed role records, or every role when the list is empty.
    pub async fn get_role_infos(
        &self,
        role_ids: &[RoleId],
        order: SortOrder,
    ) -> AppResult<Vec<RoleInfo>> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .get_role_infos(&mut *connection, role_ids, order)
            .await
    }

    /// Lists role records with their grants.
    pub async fn list_role_perms(&self, query: &RoleListQuery) -> AppResult<RolePage<RolePerms>> {
        let mut connection = self.source.acquire().await?;
        self.controller.list_role_perms(&mut *connection, query).await
    }

    /// Returns one role record with its grants.
    pub async fn get_role_perms(&self, role_id: RoleId) -> AppResult<RolePerms> {
        let mut connection = self.source.acquire().await?;
        self.controller.get_role_perms(&mut *connection, role_id).await
    }

    /// Grants permissions the role does not hold yet.
    pub async fn grant_role_perms(
        &self,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .grant_role_perms(&mut *connection, role_id, permissions)
            .await
    }

    /// Revokes the listed permissions from the role.
    pub async fn revoke_role_perms(
        &self,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .revoke_role_perms(&mut *connection, role_id, permissions)
            .await
    }

    /// Revokes every permission of the role.
    pub async fn clean_role_perms(&self, role_id: RoleId) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller
            .clean_role_perms(&mut *connection, role_id)
            .await
    }

    /// Enables a role.
    pub async fn enable_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller.enable_role(&mut *connection, role_id).await
    }

    /// Disables a role.
    pub async fn disable_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut connection = self.source.acquire().await?;
        self.controller.disable_role(&mut *connection, role_id).await
    }
}
