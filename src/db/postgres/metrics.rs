use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    aggregation::AggregationPlan,
    db::{
        error::{DbError, DbResult},
        repos::{MetricFilter, MetricRepo, OrderBy, Page, PageResult},
        sql::{self, ColumnKind, Dialect, SqlValue},
    },
    models::{CreateMetric, MetricRow, Os, ResultRow, Scalar},
};

pub struct PostgresMetricRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresMetricRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_row(row: &PgRow) -> DbResult<MetricRow> {
        let os: String = row.get("os");
        Ok(MetricRow {
            date: row.get("date"),
            channel: row.get("channel"),
            country: row.get("country"),
            os: os.parse::<Os>().map_err(DbError::Internal)?,
            impressions: row.get("impressions"),
            clicks: row.get("clicks"),
            installs: row.get("installs"),
            spend: row.get("spend"),
            revenue: row.get("revenue"),
            cpi: row.get("cpi"),
        })
    }

    fn parse_grouped_row(row: &PgRow, columns: &[(String, ColumnKind)]) -> DbResult<ResultRow> {
        let mut result = ResultRow::with_capacity(columns.len());
        for (name, kind) in columns {
            let value = match kind {
                ColumnKind::Date => row
                    .try_get::<Option<NaiveDate>, _>(name.as_str())?
                    .map_or(Scalar::Null, Scalar::Date),
                ColumnKind::Text => row
                    .try_get::<Option<String>, _>(name.as_str())?
                    .map_or(Scalar::Null, Scalar::Text),
                ColumnKind::Int => row.try_get::<Option<i64>, _>(name.as_str())?.into(),
                ColumnKind::Float => row.try_get::<Option<f64>, _>(name.as_str())?.into(),
            };
            result.push(name.clone(), value);
        }
        Ok(result)
    }

    fn bind_all<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        bindings: &[SqlValue],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        for val in bindings {
            query = match val {
                SqlValue::String(s) => query.bind(s.clone()),
                SqlValue::Date(d) => query.bind(*d),
            };
        }
        query
    }
}

/// Convert `?` placeholders to PostgreSQL's `$1, $2, ...` in order.
fn numbered_placeholders(sql: &str) -> String {
    let mut pg_sql = String::with_capacity(sql.len() + 16);
    let mut param_idx = 1;
    for ch in sql.chars() {
        if ch == '?' {
            pg_sql.push_str(&format!("${}", param_idx));
            param_idx += 1;
        } else {
            pg_sql.push(ch);
        }
    }
    pg_sql
}

#[async_trait]
impl MetricRepo for PostgresMetricRepo {
    #[tracing::instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn insert_batch(&self, metrics: Vec<CreateMetric>) -> DbResult<usize> {
        if metrics.is_empty() {
            return Ok(0);
        }

        // PostgreSQL allows 65535 bind parameters per statement; 9 per record
        const MAX_RECORDS_PER_BATCH: usize = 1000;

        let mut total_inserted = 0;
        let mut tx = self.write_pool.begin().await?;

        for chunk in metrics.chunks(MAX_RECORDS_PER_BATCH) {
            let placeholders: Vec<String> = (0..chunk.len())
                .map(|i| {
                    let base = i * 9;
                    format!(
                        "(${}, ${}, ${}, ${}, ${}, ${}, ${}, ${}, ${})",
                        base + 1,
                        base + 2,
                        base + 3,
                        base + 4,
                        base + 5,
                        base + 6,
                        base + 7,
                        base + 8,
                        base + 9
                    )
                })
                .collect();

            let query = format!(
                r#"
                INSERT INTO metrics (
                    date, channel, country, os, impressions, clicks, installs, spend, revenue
                )
                VALUES {}
                "#,
                placeholders.join(", ")
            );

            let mut query_builder = sqlx::query(&query);
            for metric in chunk {
                query_builder = query_builder
                    .bind(metric.date)
                    .bind(&metric.channel)
                    .bind(&metric.country)
                    .bind(metric.os.as_str())
                    .bind(metric.impressions)
                    .bind(metric.clicks)
                    .bind(metric.installs)
                    .bind(metric.spend)
                    .bind(metric.revenue);
            }

            let result = query_builder.execute(&mut *tx).await?;
            total_inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    async fn count(&self, filter: &MetricFilter) -> DbResult<i64> {
        let filter = sql::filter_to_sql(filter);
        let query = numbered_placeholders(&format!(
            "SELECT COUNT(*) AS cnt FROM metrics WHERE {}",
            filter.where_clause
        ));
        let row = Self::bind_all(sqlx::query(&query), &filter.bindings)
            .fetch_one(&self.read_pool)
            .await?;
        Ok(row.get("cnt"))
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        filter: &MetricFilter,
        ordering: &[OrderBy],
        page: Page,
    ) -> DbResult<PageResult<MetricRow>> {
        let filter = sql::filter_to_sql(filter);
        let statements = sql::raw_sql(Dialect::Postgres, &filter, ordering);
        let count_sql = numbered_placeholders(&statements.count);
        let data_sql = numbered_placeholders(&statements.data);

        let count_row = Self::bind_all(sqlx::query(&count_sql), &filter.bindings)
            .fetch_one(&self.read_pool)
            .await?;
        let total: i64 = count_row.get("cnt");

        let rows = Self::bind_all(sqlx::query(&data_sql), &filter.bindings)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.read_pool)
            .await?;

        let items = rows
            .iter()
            .map(Self::parse_row)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(PageResult::new(items, total))
    }

    #[tracing::instrument(skip(self, plan))]
    async fn grouped(
        &self,
        filter: &MetricFilter,
        plan: &AggregationPlan,
        ordering: &[OrderBy],
        page: Page,
    ) -> DbResult<PageResult<ResultRow>> {
        let filter = sql::filter_to_sql(filter);
        let statements = sql::grouped_sql(Dialect::Postgres, &filter, plan, ordering);

        let total: i64 = match &statements.count {
            Some(count_sql) => {
                let count_sql = numbered_placeholders(count_sql);
                let row = Self::bind_all(sqlx::query(&count_sql), &filter.bindings)
                    .fetch_one(&self.read_pool)
                    .await?;
                row.get("cnt")
            }
            None => 1,
        };

        let data_sql = numbered_placeholders(&statements.data);
        let rows = Self::bind_all(sqlx::query(&data_sql), &filter.bindings)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.read_pool)
            .await?;

        let items = rows
            .iter()
            .map(|row| Self::parse_grouped_row(row, &statements.columns))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(PageResult::new(items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(
            numbered_placeholders("date >= ? AND channel IN (?, ?) LIMIT ? OFFSET ?"),
            "date >= $1 AND channel IN ($2, $3) LIMIT $4 OFFSET $5"
        );
        assert_eq!(numbered_placeholders("1 = 1"), "1 = 1");
    }
}
