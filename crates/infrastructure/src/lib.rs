//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod casbin_controller;
mod casbin_policy_engine;
mod database;
mod policy_reloader;
mod postgres_access_controller;
mod postgres_role_store;

#[cfg(test)]
mod test_support;

pub use casbin_controller::CasbinController;
pub use casbin_policy_engine::{
    CasbinPolicyEngine, PolicyAdapterSource, RBAC0_MODEL, SqlxPolicyAdapterSource,
};
pub use database::{PostgresConnectionSource, PostgresRbac0Service, connect_and_migrate};
pub use policy_reloader::{PolicyReloadConfig, PolicyReloadHandle, PolicyReloader};
pub use postgres_access_controller::PostgresAccessController;
pub use postgres_role_store::{PostgresRoleStore, RoleState};
