use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rbac0_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::permission::{Permission, dedup_permissions};

/// Role identifier.
///
/// Zero is reserved: creating a role with it asks the store to assign one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(u32);

impl RoleId {
    /// Placeholder asking the store to assign an identifier.
    pub const UNASSIGNED: Self = Self(0);

    /// Creates a role identifier from a raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns whether the store should assign the identifier.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// Returns the value persisted in `BIGINT` columns.
    #[must_use]
    pub fn to_storage(self) -> i64 {
        i64::from(self.0)
    }

    /// Decodes a persisted identifier.
    pub fn from_storage(value: i64) -> AppResult<Self> {
        u32::try_from(value).map(Self).map_err(|error| {
            AppError::Internal(format!("stored role id '{value}' is out of range: {error}"))
        })
    }

    /// Returns the policy subject used for this role.
    #[must_use]
    pub fn policy_subject(self) -> String {
        self.0.to_string()
    }
}

impl From<u32> for RoleId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse::<u32>().map(Self).map_err(|error| {
            AppError::InvalidArgument(format!("invalid role id '{value}': {error}"))
        })
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Role record without its grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    /// Role identifier.
    pub role_id: RoleId,
    /// Disabled roles deny every check.
    pub enabled: bool,
    /// Admin roles hold every permission while enabled.
    pub is_admin: bool,
    /// Identifier of the user that created the role.
    pub creator: i64,
    /// Unique display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Role record with its current grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePerms {
    /// Role record.
    #[serde(flatten)]
    pub info: RoleInfo,
    /// Granted permissions.
    pub permissions: Vec<Permission>,
}

impl RolePerms {
    /// Combines a role record with its grants.
    #[must_use]
    pub fn new(info: RoleInfo, permissions: Vec<Permission>) -> Self {
        Self { info, permissions }
    }
}

/// Validated input for creating a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    role_id: RoleId,
    creator: i64,
    name: NonEmptyString,
    description: String,
    is_admin: bool,
    permissions: Vec<Permission>,
}

impl CreateRoleInput {
    /// Creates a role input.
    ///
    /// Repeated permissions are collapsed; admin roles never carry grants.
    pub fn new(
        role_id: RoleId,
        creator: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        is_admin: bool,
        permissions: &[Permission],
    ) -> AppResult<Self> {
        let permissions = if is_admin {
            Vec::new()
        } else {
            dedup_permissions(permissions)
        };

        Ok(Self {
            role_id,
            creator,
            name: NonEmptyString::new(name)?,
            description: description.into(),
            is_admin,
            permissions,
        })
    }

    /// Requested identifier, possibly [`RoleId::UNASSIGNED`].
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Creator identifier.
    #[must_use]
    pub fn creator(&self) -> i64 {
        self.creator
    }

    /// Role name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Role description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Whether the role is an admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Initial grants.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        self.permissions.as_slice()
    }
}
