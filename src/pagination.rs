use serde::Deserialize;

use crate::error::{AppError, AppResult};

pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Raw paging query parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub direction: SortDirection,
}
fn default_limit() -> i64 { 20 }

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            direction: SortDirection::Desc,
        }
    }
}

/// Validated page over bookings, sorted by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
    pub direction: SortDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            direction: SortDirection::Desc,
        }
    }
}

impl TryFrom<Pagination> for PageRequest {
    type Error = AppError;

    fn try_from(p: Pagination) -> AppResult<Self> {
        if p.limit < 1 || p.limit > MAX_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if p.offset < 0 {
            return Err(AppError::Validation("offset must not be negative".into()));
        }
        Ok(Self {
            limit: p.limit,
            offset: p.offset,
            direction: p.direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_start_descending() {
        let page = PageRequest::try_from(Pagination::default()).unwrap();
        assert_eq!(page, PageRequest::default());
        assert_eq!(page.direction.as_sql(), "DESC");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero = Pagination { limit: 0, ..Pagination::default() };
        assert!(PageRequest::try_from(zero).is_err());
        let negative = Pagination { offset: -1, ..Pagination::default() };
        assert!(PageRequest::try_from(negative).is_err());
    }
}
