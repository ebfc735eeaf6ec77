use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Caller-defined resource identifier.
///
/// The engine assigns no meaning to the contents beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Creates an object identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for ObjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Caller-defined operation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Creates an action identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for ActionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// An (object, action) pair granted to a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Resource the permission applies to.
    pub object: ObjectId,
    /// Operation allowed on the resource.
    pub action: ActionId,
}

impl Permission {
    /// Creates a permission from any string-like object and action.
    #[must_use]
    pub fn new(object: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            object: ObjectId::new(object),
            action: ActionId::new(action),
        }
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.object, self.action)
    }
}

/// Outcome of a single-role authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermCheck {
    /// Whether the role may perform the action.
    pub allowed: bool,
    /// Whether the role is enabled.
    pub enabled: bool,
    /// Whether the role is an admin role.
    pub is_admin: bool,
}

impl PermCheck {
    /// Decides a check from role state alone.
    ///
    /// Returns `None` for enabled non-admin roles, whose outcome depends on
    /// their grants.
    #[must_use]
    pub fn from_role_state(enabled: bool, is_admin: bool) -> Option<Self> {
        if !enabled {
            return Some(Self {
                allowed: false,
                enabled,
                is_admin,
            });
        }

        is_admin.then_some(Self {
            allowed: true,
            enabled,
            is_admin,
        })
    }

    /// Outcome for an enabled non-admin role after the grant lookup.
    #[must_use]
    pub fn from_grant(granted: bool) -> Self {
        Self {
            allowed: granted,
            enabled: true,
            is_admin: false,
        }
    }
}

/// Collapses repeated permissions while keeping the first-seen order.
#[must_use]
pub fn dedup_permissions(permissions: &[Permission]) -> Vec<Permission> {
    let mut seen = HashSet::with_capacity(permissions.len());
    permissions
        .iter()
        .filter(|permission| seen.insert(*permission))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{PermCheck, Permission, dedup_permissions};

    #[test]
    fn disabled_admin_is_denied() {
        let check = PermCheck::from_role_state(false, true);
        assert_eq!(
            check,
            Some(PermCheck {
                allowed: false,
                enabled: false,
                is_admin: true,
            })
        );
    }

    #[test]
    fn enabled_admin_is_decided_without_grants() {
        let check = PermCheck::from_role_state(true, true);
        assert!(check.is_some_and(|check| check.allowed));
    }

    #[test]
    fn enabled_non_admin_needs_grant_lookup() {
        assert!(PermCheck::from_role_state(true, false).is_none());
        assert!(PermCheck::from_grant(true).allowed);
        assert!(!PermCheck::from_grant(false).allowed);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let permissions = vec![
            Permission::new("o2", "a1"),
            Permission::new("o1", "a1"),
            Permission::new("o2", "a1"),
        ];

        let deduped = dedup_permissions(&permissions);

        assert_eq!(
            deduped,
            vec![Permission::new("o2", "a1"), Permission::new("o1", "a1")]
        );
    }

    #[test]
    fn permission_serializes_as_plain_strings() {
        let json = serde_json::to_string(&Permission::new("tenant", "write"));
        assert_eq!(
            json.unwrap_or_default(),
            r#"{"object":"tenant","action":"write"}"#
        );
    }
}
