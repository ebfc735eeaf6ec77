//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod permission;
mod role;
mod role_query;

pub use permission::{ActionId, ObjectId, PermCheck, Permission, dedup_permissions};
pub use role::{CreateRoleInput, RoleId, RoleInfo, RolePerms};
pub use role_query::{EnableFilter, PageLimit, RoleListQuery, RolePage, SortOrder};
