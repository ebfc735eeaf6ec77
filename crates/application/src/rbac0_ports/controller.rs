use async_trait::async_trait;

use rbac0_core::AppResult;
use rbac0_domain::{
    ActionId, CreateRoleInput, ObjectId, PermCheck, Permission, RoleId, RoleInfo, RoleListQuery,
    RolePage, RolePerms, SortOrder,
};

/// Authorization contract implemented by every RBAC0 backend.
///
/// Every operation runs against the caller's connection. Passing an open
/// transaction composes the operation into it; multi-step operations open a
/// nested transaction (a savepoint) of their own.
#[async_trait]
pub trait Rbac0Controller: Send + Sync {
    /// Connection the operations run against.
    type Connection: Send;

    /// Stable backend name used in logs and diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Checks one role against an (object, action) pair.
    ///
    /// Disabled roles are denied and enabled admin roles are allowed without
    /// consulting grants.
    async fn check_perm(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
        object: &ObjectId,
        action: &ActionId,
    ) -> AppResult<PermCheck>;

    /// Returns true as soon as one of the roles is allowed.
    ///
    /// Roles are checked in order and the first error is returned.
    async fn check_perms(
        &self,
        connection: &mut Self::Connection,
        role_ids: &[RoleId],
        object: &ObjectId,
        action: &ActionId,
    ) -> AppResult<bool> {
        for role_id in role_ids {
            if self
                .check_perm(connection, *role_id, object, action)
                .await?
                .allowed
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Creates a role together with its initial grants.
    async fn create_role(
        &self,
        connection: &mut Self::Connection,
        input: CreateRoleInput,
    ) -> AppResult<RolePerms>;

    /// Updates the name and description of a role.
    async fn update_role(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
        name: &str,
        description: &str,
    ) -> AppResult<()>;

    /// Deletes a role and its grants.
    async fn delete_role(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Lists role records matching the query.
    async fn list_role_info(
        &self,
        connection: &mut Self::Connection,
        query: &RoleListQuery,
    ) -> AppResult<RolePage<RoleInfo>>;

    /// Returns one role record.
    async fn get_role_info(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<RoleInfo>;

    /// Returns the listed role records, or every role when the list is empty.
    async fn get_role_infos(
        &self,
        connection: &mut Self::Connection,
        role_ids: &[RoleId],
        order: SortOrder,
    ) -> AppResult<Vec<RoleInfo>>;

    /// Lists role records with their grants.
    async fn list_role_perms(
        &self,
        connection: &mut Self::Connection,
        query: &RoleListQuery,
    ) -> AppResult<RolePage<RolePerms>>;

    /// Returns one role record with its grants.
    async fn get_role_perms(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<RolePerms>;

    /// Grants permissions the role does not hold yet.
    async fn grant_role_perms(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()>;

    /// Revokes the listed permissions from the role.
    async fn revoke_role_perms(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
        permissions: &[Permission],
    ) -> AppResult<()>;

    /// Revokes every permission of the role.
    async fn clean_role_perms(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Enables a role.
    async fn enable_role(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<()>;

    /// Disables a role. Its grants are kept.
    async fn disable_role(
        &self,
        connection: &mut Self::Connection,
        role_id: RoleId,
    ) -> AppResult<()>;
}
