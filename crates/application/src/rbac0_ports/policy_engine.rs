use async_trait::async_trait;

use rbac0_core::AppResult;
use rbac0_domain::{ActionId, ObjectId, Permission, RoleId};

/// One `(subject, object, action)` policy rule.
///
/// The subject is the decimal form of the role identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRule {
    /// Policy subject.
    pub subject: String,
    /// Resource identifier.
    pub object: ObjectId,
    /// Operation identifier.
    pub action: ActionId,
}

impl PolicyRule {
    /// Builds the rule granting a permission to a role.
    #[must_use]
    pub fn for_role(role_id: RoleId, permission: &Permission) -> Self {
        Self {
            subject: role_id.policy_subject(),
            object: permission.object.clone(),
            action: permission.action.clone(),
        }
    }

    /// Builds the rule checked for a role request.
    #[must_use]
    pub fn request(role_id: RoleId, object: &ObjectId, action: &ActionId) -> Self {
        Self {
            subject: role_id.policy_subject(),
            object: object.clone(),
            action: action.clone(),
        }
    }

    /// Decodes a rule from its stored values; anything but three fields is skipped.
    #[must_use]
    pub fn from_values(values: &[String]) -> Option<Self> {
        match values {
            [subject, object, action] => Some(Self {
                subject: subject.clone(),
                object: ObjectId::new(object.as_str()),
                action: ActionId::new(action.as_str()),
            }),
            _ => None,
        }
    }

    /// Returns the stored field values.
    #[must_use]
    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.subject.clone(),
            self.object.as_str().to_owned(),
            self.action.as_str().to_owned(),
        ]
    }

    /// Returns the granted permission.
    #[must_use]
    pub fn permission(&self) -> Permission {
        Permission {
            object: self.object.clone(),
            action: self.action.clone(),
        }
    }
}

/// Policy engine port holding the rules of the policy backend.
///
/// Checks read a cache of the persisted rules. Writes compare against the
/// persisted rules, so rules written by other processes are seen by them.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Returns whether the rule is currently allowed.
    async fn enforce(&self, rule: &PolicyRule) -> AppResult<bool>;

    /// Adds rules not persisted yet and returns how many were added.
    async fn add_rules(&self, rules: &[PolicyRule]) -> AppResult<usize>;

    /// Removes persisted rules and returns how many were removed.
    async fn remove_rules(&self, rules: &[PolicyRule]) -> AppResult<usize>;

    /// Removes every rule of a subject and returns how many were removed.
    async fn remove_subject(&self, subject: &str) -> AppResult<usize>;

    /// Returns every rule of a subject.
    async fn rules_for_subject(&self, subject: &str) -> AppResult<Vec<PolicyRule>>;

    /// Replaces the in-memory rules with the persisted ones.
    async fn reload(&self) -> AppResult<()>;
}
