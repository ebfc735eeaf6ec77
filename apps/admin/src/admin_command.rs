use serde_json::{Value, json};

use rbac0_core::{AppError, AppResult};
use rbac0_domain::{ActionId, ObjectId, Permission, RoleId, RoleListQuery};
use rbac0_infrastructure::PostgresRbac0Service;

const USAGE: &str = "usage: rbac0-admin <migrate | roles [name-filter] | check <role> <object> <action> | grant <role> <object> <action> | revoke <role> <object> <action>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Migrate,
    Roles {
        name_filter: Option<String>,
    },
    Check {
        role_id: RoleId,
        object: ObjectId,
        action: ActionId,
    },
    Grant {
        role_id: RoleId,
        permission: Permission,
    },
    Revoke {
        role_id: RoleId,
        permission: Permission,
    },
}

impl AdminCommand {
    pub fn parse(args: &[String]) -> AppResult<Self> {
        let args = args.iter().map(String::as_str).collect::<Vec<_>>();

        match args.as_slice() {
            ["migrate"] => Ok(Self::Migrate),
            ["roles"] => Ok(Self::Roles { name_filter: None }),
            ["roles", name_filter] => Ok(Self::Roles {
                name_filter: Some((*name_filter).to_owned()),
            }),
            ["check", role_id, object, action] => Ok(Self::Check {
                role_id: role_id.parse()?,
                object: ObjectId::from(*object),
                action: ActionId::from(*action),
            }),
            ["grant", role_id, object, action] => Ok(Self::Grant {
                role_id: role_id.parse()?,
                permission: Permission::new(*object, *action),
            }),
            ["revoke", role_id, object, action] => Ok(Self::Revoke {
                role_id: role_id.parse()?,
                permission: Permission::new(*object, *action),
            }),
            _ => Err(AppError::InvalidArgument(USAGE.to_owned())),
        }
    }

    pub async fn run(self, service: &PostgresRbac0Service) -> AppResult<Value> {
        match self {
            Self::Migrate => Ok(json!({ "migrated": true })),
            Self::Roles { name_filter } => {
                let mut query = RoleListQuery::all();
                query.name_contains = name_filter.filter(|value| !value.is_empty());
                to_json(&service.list_role_perms(&query).await?)
            }
            Self::Check {
                role_id,
                object,
                action,
            } => to_json(&service.check_perm(role_id, &object, &action).await?),
            Self::Grant {
                role_id,
                permission,
            } => {
                service.grant_role_perms(role_id, &[permission]).await?;
                to_json(&service.get_role_perms(role_id).await?)
            }
            Self::Revoke {
                role_id,
                permission,
            } => {
                service.revoke_role_perms(role_id, &[permission]).await?;
                to_json(&service.get_role_perms(role_id).await?)
            }
        }
    }
}

fn to_json(value: &impl serde::Serialize) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))
}

#[cfg(test)]
mod tests {
    use rbac0_domain::{Permission, RoleId};

    use super::AdminCommand;

    fn parse(args: &[&str]) -> Option<AdminCommand> {
        let args = args
            .iter()
            .map(|arg| (*arg).to_owned())
            .collect::<Vec<_>>();
        AdminCommand::parse(&args).ok()
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(parse(&["migrate"]), Some(AdminCommand::Migrate));
        assert_eq!(
            parse(&["roles", "tenant"]),
            Some(AdminCommand::Roles {
                name_filter: Some("tenant".to_owned())
            })
        );
        assert_eq!(
            parse(&["grant", "12", "ledger", "read"]),
            Some(AdminCommand::Grant {
                role_id: RoleId::new(12),
                permission: Permission::new("ledger", "read"),
            })
        );
        assert!(matches!(
            parse(&["check", "3", "ledger", "write"]),
            Some(AdminCommand::Check { role_id, .. }) if role_id == RoleId::new(3)
        ));
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["grant", "-1", "ledger", "read"]), None);
        assert_eq!(parse(&["revoke", "1", "ledger"]), None);
    }
}
