use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Resolves to `(limit, offset)` using `default_limit` when no limit was sent.
    /// A page whose offset does not fit in an `i64` is a validation error.
    pub fn resolve(&self, default_limit: i64) -> Result<(i64, i64), ApiError> {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        let page = self.page.unwrap_or(1).max(1);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ApiError::Validation("Invalid page".into()))?;
        Ok((limit, offset))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, limit: i64, offset: i64) -> Self {
        let page = offset / limit + 1;
        let next = (offset.saturating_add(limit) < count).then(|| page + 1);
        let previous = (page > 1).then(|| page - 1);
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}
