use async_trait::async_trait;

use super::{MetricFilter, OrderBy, Page, PageResult};
use crate::{
    aggregation::AggregationPlan,
    db::error::DbResult,
    models::{CreateMetric, MetricRow, ResultRow},
};

#[async_trait]
pub trait MetricRepo: Send + Sync {
    /// Insert a batch of records.
    /// Uses a single transaction with multi-row inserts.
    /// Returns the number of records inserted.
    async fn insert_batch(&self, metrics: Vec<CreateMetric>) -> DbResult<usize>;

    /// Count records matching the filter.
    async fn count(&self, filter: &MetricFilter) -> DbResult<i64>;

    /// List raw records with per-row CPI.
    ///
    /// Ties in `ordering` are broken by insertion order.
    async fn list(
        &self,
        filter: &MetricFilter,
        ordering: &[OrderBy],
        page: Page,
    ) -> DbResult<PageResult<MetricRow>>;

    /// Execute an aggregation plan over the filtered records.
    ///
    /// Rows carry the plan's group keys followed by its outputs. Ties in
    /// `ordering` are broken by the group keys. `total` is the number of
    /// groups; a plan without group keys always yields exactly one row.
    async fn grouped(
        &self,
        filter: &MetricFilter,
        plan: &AggregationPlan,
        ordering: &[OrderBy],
        page: Page,
    ) -> DbResult<PageResult<ResultRow>>;
}
