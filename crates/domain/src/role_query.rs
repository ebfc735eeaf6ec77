use rbac0_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Filter on the role enable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnableFilter {
    /// No filter.
    #[default]
    Any,
    /// Only enabled roles.
    EnabledOnly,
    /// Only disabled roles.
    DisabledOnly,
}

impl EnableFilter {
    /// Decodes the signed wire form: positive, negative or zero.
    #[must_use]
    pub fn from_signed(value: i32) -> Self {
        match value.signum() {
            1 => Self::EnabledOnly,
            -1 => Self::DisabledOnly,
            _ => Self::Any,
        }
    }

    /// Returns the required flag value, if any.
    #[must_use]
    pub fn required_flag(self) -> Option<bool> {
        match self {
            Self::Any => None,
            Self::EnabledOnly => Some(true),
            Self::DisabledOnly => Some(false),
        }
    }
}

/// Ordering by role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending identifiers.
    #[default]
    Ascending,
    /// Descending identifiers.
    Descending,
}

impl SortOrder {
    /// Decodes the signed wire form: negative means descending.
    #[must_use]
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    /// Returns whether identifiers are returned in descending order.
    #[must_use]
    pub fn is_descending(self) -> bool {
        matches!(self, Self::Descending)
    }
}

/// Page size for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLimit {
    /// Return every matching row.
    Unbounded,
    /// Return at most this many rows.
    Rows(u64),
}

impl PageLimit {
    /// Sentinel for [`PageLimit::Unbounded`] in the signed wire form.
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// Decodes the signed wire form.
    pub fn from_signed(value: i64) -> AppResult<Self> {
        if value == Self::UNBOUNDED_SENTINEL {
            return Ok(Self::Unbounded);
        }

        if value <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "limit must be positive or {}, got {value}",
                Self::UNBOUNDED_SENTINEL
            )));
        }

        u64::try_from(value)
            .map(Self::Rows)
            .map_err(|error| AppError::InvalidArgument(format!("invalid limit {value}: {error}")))
    }

    /// Returns the SQL `LIMIT` value; `None` binds as `LIMIT NULL`.
    pub fn as_sql(self) -> AppResult<Option<i64>> {
        match self {
            Self::Unbounded => Ok(None),
            Self::Rows(rows) => i64::try_from(rows).map(Some).map_err(|error| {
                AppError::InvalidArgument(format!("invalid limit {rows}: {error}"))
            }),
        }
    }
}

/// Filtered, paginated role listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleListQuery {
    /// Case-sensitive substring the name must contain.
    pub name_contains: Option<String>,
    /// Enable flag filter.
    pub enable: EnableFilter,
    /// Rows skipped before the page.
    pub offset: u64,
    /// Page size.
    pub limit: PageLimit,
    /// Ordering by identifier.
    pub order: SortOrder,
}

impl RoleListQuery {
    /// Builds a query from the signed wire form.
    ///
    /// An empty name means no name filter. A negative offset, or a limit that
    /// is neither positive nor the unbounded sentinel, is rejected.
    pub fn from_signed(
        name_contains: &str,
        enable: i32,
        offset: i64,
        limit: i64,
        order: i64,
    ) -> AppResult<Self> {
        let offset = u64::try_from(offset).map_err(|_| {
            AppError::InvalidArgument(format!("offset must not be negative, got {offset}"))
        })?;

        Ok(Self {
            name_contains: (!name_contains.is_empty()).then(|| name_contains.to_owned()),
            enable: EnableFilter::from_signed(enable),
            offset,
            limit: PageLimit::from_signed(limit)?,
            order: SortOrder::from_signed(order),
        })
    }

    /// Query matching every role in ascending order.
    #[must_use]
    pub fn all() -> Self {
        Self {
            name_contains: None,
            enable: EnableFilter::Any,
            offset: 0,
            limit: PageLimit::Unbounded,
            order: SortOrder::Ascending,
        }
    }

    /// Returns the SQL `OFFSET` value.
    pub fn offset_as_sql(&self) -> AppResult<i64> {
        i64::try_from(self.offset).map_err(|error| {
            AppError::InvalidArgument(format!("invalid offset {}: {error}", self.offset))
        })
    }
}

/// One page of listed rows with the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePage<T> {
    /// Rows in this page.
    pub items: Vec<T>,
    /// Number of rows matching the filters, ignoring pagination.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{EnableFilter, PageLimit, RoleListQuery, SortOrder};

    #[test]
    fn empty_name_means_no_filter() {
        let query = RoleListQuery::from_signed("", 0, 0, 10, 0);
        assert!(query.is_ok_and(|query| query.name_contains.is_none()));
    }

    #[test]
    fn unbounded_sentinel_is_accepted() {
        let query = RoleListQuery::from_signed("tenant", 1, 0, -1, -1);
        let Ok(query) = query else {
            panic!("unbounded query should be valid");
        };

        assert_eq!(query.limit, PageLimit::Unbounded);
        assert_eq!(query.enable, EnableFilter::EnabledOnly);
        assert_eq!(query.order, SortOrder::Descending);
        assert_eq!(query.name_contains.as_deref(), Some("tenant"));
        assert!(matches!(query.limit.as_sql(), Ok(None)));
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(RoleListQuery::from_signed("", 0, 0, 0, 0).is_err());
    }

    #[test]
    fn enable_filter_maps_sign() {
        assert_eq!(EnableFilter::from_signed(5).required_flag(), Some(true));
        assert_eq!(EnableFilter::from_signed(-3).required_flag(), Some(false));
        assert_eq!(EnableFilter::from_signed(0).required_flag(), None);
    }

    proptest! {
        #[test]
        fn negative_offset_is_rejected(offset in i64::MIN..0, limit in 1_i64..1_000) {
            prop_assert!(RoleListQuery::from_signed("", 0, offset, limit, 0).is_err());
        }

        #[test]
        fn non_positive_limit_other_than_sentinel_is_rejected(limit in i64::MIN..=0) {
            prop_assume!(limit != PageLimit::UNBOUNDED_SENTINEL);
            prop_assert!(RoleListQuery::from_signed("", 0, 0, limit, 0).is_err());
        }

        #[test]
        fn positive_limit_is_kept(offset in 0_i64..10_000, limit in 1_i64..10_000) {
            let query = RoleListQuery::from_signed("", 0, offset, limit, 0);
            prop_assert!(query.is_ok());
            if let Ok(query) = query {
                prop_assert_eq!(query.limit.as_sql().ok().flatten(), Some(limit));
                prop_assert_eq!(query.offset_as_sql().ok(), Some(offset));
            }
        }
    }
}
