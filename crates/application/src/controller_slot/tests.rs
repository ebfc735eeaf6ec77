use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use rbac0_core::{AppError, AppResult};
use rbac0_domain::{
    ActionId, CreateRoleInput, ObjectId, PermCheck, Permission, RoleId, RoleInfo, RoleListQuery,
    RolePage, RolePerms, SortOrder,
};

use crate::{ConnectionSource, Rbac0Controller, Rbac0Service};

use super::Rbac0Slot;

#[derive(Default)]
struct FakeConnection {
    checked: Vec<RoleId>,
}

#[derive(Clone, Default)]
struct FakeSource {
    acquired: Arc<AtomicUsize>,
}

#[async_trait]
impl ConnectionSource for FakeSource {
    type Connection = FakeConnection;
    type Lease = Box<FakeConnection>;

    async fn acquire(&self) -> AppResult<Self::Lease> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::default())
    }
}

struct FakeController {
    name: &'static str,
}

fn unsupported<T>() -> AppResult<T> {
    Err(AppError::Internal("fake controller".to_owned()))
}

#[async_trait]
impl Rbac0Controller for FakeController {
    type Connection = FakeConnection;

    fn backend_name(&self) -> &'static str {
        self.name
    }

    async fn check_perm(
        &self,
        connection: &mut FakeConnection,
        role_id: RoleId,
        _object: &ObjectId,
        _action: &ActionId,
    ) -> AppResult<PermCheck> {
        connection.checked.push(role_id);
        Ok(PermCheck::from_grant(role_id == RoleId::new(2)))
    }

    async fn create_role(
        &self,
        _connection: &mut FakeConnection,
        _input: CreateRoleInput,
    ) -> AppResult<RolePerms> {
        unsupported()
    }

    async fn update_role(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
        _name: &str,
        _description: &str,
    ) -> AppResult<()> {
        unsupported()
    }

    async fn delete_role(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<()> {
        unsupported()
    }

    async fn list_role_info(
        &self,
        _connection: &mut FakeConnection,
        _query: &RoleListQuery,
    ) -> AppResult<RolePage<RoleInfo>> {
        unsupported()
    }

    async fn get_role_info(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<RoleInfo> {
        unsupported()
    }

    async fn get_role_infos(
        &self,
        _connection: &mut FakeConnection,
        _role_ids: &[RoleId],
        _order: SortOrder,
    ) -> AppResult<Vec<RoleInfo>> {
        unsupported()
    }

    async fn list_role_perms(
        &self,
        _connection: &mut FakeConnection,
        _query: &RoleListQuery,
    ) -> AppResult<RolePage<RolePerms>> {
        unsupported()
    }

    async fn get_role_perms(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<RolePerms> {
        unsupported()
    }

    async fn grant_role_perms(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
        _permissions: &[Permission],
    ) -> AppResult<()> {
        unsupported()
    }

    async fn revoke_role_perms(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
        _permissions: &[Permission],
    ) -> AppResult<()> {
        unsupported()
    }

    async fn clean_role_perms(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<()> {
        unsupported()
    }

    async fn enable_role(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<()> {
        unsupported()
    }

    async fn disable_role(
        &self,
        _connection: &mut FakeConnection,
        _role_id: RoleId,
    ) -> AppResult<()> {
        unsupported()
    }
}

fn service(name: &'static str) -> Rbac0Service<FakeSource> {
    Rbac0Service::new(FakeSource::default(), Arc::new(FakeController { name }))
}

#[test]
fn slot_rejects_use_before_install() {
    let slot = Rbac0Slot::<FakeSource>::new();

    assert!(!slot.is_initialized());
    assert!(matches!(slot.service(), Err(AppError::NotInitialized(_))));
}

#[test]
fn slot_installs_backend_once() {
    let slot = Rbac0Slot::new();

    let first = slot.install(service("access"));
    assert!(first.is_ok());
    assert!(slot.is_initialized());
    assert_eq!(
        slot.service().map(Rbac0Service::backend_name).ok(),
        Some("access")
    );
}

#[test]
fn second_install_is_rejected_and_keeps_first_backend() {
    let slot = Rbac0Slot::new();
    assert!(slot.install(service("access")).is_ok());

    let second = slot.install(service("casbin"));

    assert!(matches!(second, Err(AppError::AlreadyInitialized(_))));
    assert_eq!(
        slot.service().map(Rbac0Service::backend_name).ok(),
        Some("access")
    );
}

#[test]
fn static_slot_is_shared() {
    static SLOT: Rbac0Slot<FakeSource> = Rbac0Slot::new();

    assert!(SLOT.install(service("casbin")).is_ok());
    assert!(matches!(
        SLOT.install(service("access")),
        Err(AppError::AlreadyInitialized(_))
    ));
    assert_eq!(SLOT.service().map(Rbac0Service::backend_name).ok(), Some("casbin"));
}

#[tokio::test]
async fn service_borrows_one_connection_per_call() {
    let source = FakeSource::default();
    let service = Rbac0Service::new(source.clone(), Arc::new(FakeController { name: "access" }));
    let object = ObjectId::from("ledger");
    let action = ActionId::from("read");

    let single = service.check_perm(RoleId::new(1), &object, &action).await;
    let any = service
        .check_perms(&[RoleId::new(1), RoleId::new(2)], &object, &action)
        .await;

    assert!(single.is_ok_and(|check| !check.allowed));
    assert!(matches!(any, Ok(true)));
    assert_eq!(source.acquired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn controller_composes_calls_on_the_callers_connection() {
    let service = service("access");
    let mut connection = FakeConnection::default();
    let object = ObjectId::from("ledger");
    let action = ActionId::from("read");

    let allowed = service
        .controller()
        .check_perms(
            &mut connection,
            &[RoleId::new(1), RoleId::new(2), RoleId::new(3)],
            &object,
            &action,
        )
        .await;

    assert!(matches!(allowed, Ok(true)));
    assert_eq!(connection.checked, vec![RoleId::new(1), RoleId::new(2)]);
}
