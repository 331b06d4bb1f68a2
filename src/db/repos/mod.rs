mod metrics;

use chrono::NaiveDate;
pub use metrics::*;

use crate::{aggregation::Field, models::Os};

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Get the SQL ORDER BY direction string.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A column results can be ordered by.
///
/// Covers every name a raw row or a grouped row can carry, so ORDER BY
/// clauses are only ever built from this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKey {
    Field(Field),
    Cpi,
}

impl OrderKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKey::Field(field) => field.as_str(),
            OrderKey::Cpi => crate::aggregation::CPI,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        if name == crate::aggregation::CPI {
            return Some(OrderKey::Cpi);
        }
        name.parse::<Field>().ok().map(OrderKey::Field)
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(key: OrderKey) -> Self {
        Self {
            key,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(key: OrderKey) -> Self {
        Self {
            key,
            order: SortOrder::Desc,
        }
    }
}

/// Equality and range constraints applied before grouping.
///
/// All set constraints must hold. An empty list means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricFilter {
    /// Inclusive lower bound on `date`.
    pub date_after: Option<NaiveDate>,
    /// Inclusive upper bound on `date`.
    pub date_before: Option<NaiveDate>,
    pub channel: Option<String>,
    pub channel_in: Vec<String>,
    pub countries: Vec<String>,
    pub os: Option<Os>,
    pub os_in: Vec<Os>,
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Result of a paginated query.
#[derive(Debug, Clone)]
pub struct PageResult<T> {
    /// The items returned for this page.
    pub items: Vec<T>,
    /// Number of items (or groups) matching the query across all pages.
    pub total: i64,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }
}
