use std::sync::Arc;

use thiserror::Error;

use crate::{
    aggregation::{AggregationError, AggregationPlan, CPI, Field, aggregate},
    db::{DbError, DbPool, MetricFilter, OrderBy, OrderKey, Page, PageResult, SortOrder},
    models::{MetricRow, ResultRow},
};

/// Errors that can occur in the MetricService.
#[derive(Debug, Error)]
pub enum MetricServiceError {
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Cannot order by '{0}': not a column of the result")]
    InvalidOrdering(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type MetricServiceResult<T> = Result<T, MetricServiceError>;

/// A parsed metrics request.
#[derive(Debug, Clone, Default)]
pub struct MetricQuery {
    pub group_by: Vec<String>,
    pub display_columns: Vec<String>,
    pub filter: MetricFilter,
    /// Ordering terms, `-` prefix for descending.
    pub ordering: Vec<String>,
    pub page: Page,
}

impl MetricQuery {
    /// Aggregation applies only when both lists are non-empty.
    pub fn is_aggregation(&self) -> bool {
        !self.group_by.is_empty() && !self.display_columns.is_empty()
    }
}

/// Result of a metrics request: raw records or grouped rows.
#[derive(Debug, Clone)]
pub enum MetricQueryResult {
    Raw(PageResult<MetricRow>),
    Grouped(PageResult<ResultRow>),
}

/// Service layer for metric queries and bulk loading
#[derive(Clone)]
pub struct MetricService {
    db: Arc<DbPool>,
}

impl MetricService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Run a metrics request.
    ///
    /// In aggregation mode the request is validated by the aggregation engine
    /// before any query is issued. Ordering defaults to the group keys
    /// (aggregated) or `date` (raw).
    pub async fn query(&self, query: &MetricQuery) -> MetricServiceResult<MetricQueryResult> {
        if query.is_aggregation() {
            let plan = aggregate(&query.group_by, &query.display_columns)?;
            let ordering = grouped_ordering(&plan, &query.ordering)?;
            let result = self
                .db
                .metrics()
                .grouped(&query.filter, &plan, &ordering, query.page)
                .await?;
            Ok(MetricQueryResult::Grouped(result))
        } else {
            let ordering = raw_ordering(&query.ordering)?;
            let result = self
                .db
                .metrics()
                .list(&query.filter, &ordering, query.page)
                .await?;
            Ok(MetricQueryResult::Raw(result))
        }
    }

    /// Insert records in one transaction, returning how many were stored.
    pub async fn insert(
        &self,
        metrics: Vec<crate::models::CreateMetric>,
    ) -> MetricServiceResult<usize> {
        Ok(self.db.metrics().insert_batch(metrics).await?)
    }
}

fn parse_term(term: &str) -> (&str, SortOrder) {
    match term.strip_prefix('-') {
        Some(name) => (name, SortOrder::Desc),
        None => (term, SortOrder::Asc),
    }
}

fn parse_ordering(
    terms: &[String],
    allowed: impl Fn(&str) -> bool,
) -> MetricServiceResult<Vec<OrderBy>> {
    terms
        .iter()
        .map(|term| {
            let (name, order) = parse_term(term);
            OrderKey::parse(name)
                .filter(|_| allowed(name))
                .map(|key| OrderBy { key, order })
                .ok_or_else(|| MetricServiceError::InvalidOrdering(term.clone()))
        })
        .collect()
}

fn grouped_ordering(plan: &AggregationPlan, terms: &[String]) -> MetricServiceResult<Vec<OrderBy>> {
    if terms.is_empty() {
        return Ok(plan
            .group_by()
            .iter()
            .map(|field| OrderBy::asc(OrderKey::Field(*field)))
            .collect());
    }
    parse_ordering(terms, |name| plan.has_output(name))
}

fn raw_ordering(terms: &[String]) -> MetricServiceResult<Vec<OrderBy>> {
    if terms.is_empty() {
        return Ok(vec![OrderBy::asc(OrderKey::Field(Field::Date))]);
    }
    parse_ordering(terms, |name| name == CPI || name.parse::<Field>().is_ok())
}
