//! Offset pagination bounds.

use serde::{Deserialize, Serialize};

use super::QueryError;

/// Validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

/// Default and maximum page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 100,
        }
    }
}

impl Page {
    /// Validate raw caller input.
    ///
    /// Negative values are rejected; `limit` is clamped to `1..=max_limit`.
    pub fn from_raw(
        limit: Option<i64>,
        offset: Option<i64>,
        limits: PageLimits,
    ) -> Result<Self, QueryError> {
        let max_limit = limits.max_limit.max(1);
        let limit = match limit {
            Some(value) if value < 0 => return Err(QueryError::NegativePagination("limit")),
            Some(value) => value.clamp(1, i64::from(max_limit)) as u32,
            None => limits.default_limit.clamp(1, max_limit),
        };
        let offset = match offset {
            Some(value) if value < 0 => return Err(QueryError::NegativePagination("offset")),
            Some(value) => value as u64,
            None => 0,
        };
        Ok(Self { limit, offset })
    }

    /// Rows to request: one more than the page so `has_more` can be detected.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }

    pub(crate) fn offset_param(&self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }
}
