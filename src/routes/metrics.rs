//! `GET /api/v1/metrics`: raw records or grouped aggregates.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use axum_valid::{Valid, ValidRejection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ApiError;
use crate::{
    AppState,
    db::{MetricFilter, Page, PageResult},
    models::Os,
    services::{MetricQuery, MetricQueryResult},
};

/// Query parameters for the metrics endpoint.
///
/// List parameters are comma separated; empty segments are ignored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MetricsParams {
    pub group_by: Option<String>,
    #[serde(alias = "columns")]
    pub display_columns: Option<String>,
    /// Inclusive lower bound (YYYY-MM-DD)
    pub date_after: Option<NaiveDate>,
    /// Inclusive upper bound (YYYY-MM-DD)
    pub date_before: Option<NaiveDate>,
    pub channel: Option<String>,
    #[serde(rename = "channel__in")]
    pub channel_in: Option<String>,
    pub country: Option<String>,
    pub os: Option<String>,
    #[serde(rename = "os__in")]
    pub os_in: Option<String>,
    /// Output column names, `-` prefix for descending
    pub ordering: Option<String>,
    #[validate(range(min = 1))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse<T> {
    /// Records (or groups) matching the request across all pages
    pub count: i64,
    pub results: Vec<T>,
    pub pagination: Pagination,
}

impl<T> MetricsResponse<T> {
    fn new(result: PageResult<T>, page: Page) -> Self {
        let has_more = page.offset + (result.items.len() as i64) < result.total;
        Self {
            count: result.total,
            results: result.items,
            pagination: Pagination {
                limit: page.limit,
                offset: page.offset,
                has_more,
            },
        }
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_os(param: &'static str, value: &str) -> Result<Os, ApiError> {
    value
        .parse::<Os>()
        .map_err(|message| ApiError::invalid_param(param, message))
}

impl MetricsParams {
    fn filter(&self) -> Result<MetricFilter, ApiError> {
        if let (Some(after), Some(before)) = (self.date_after, self.date_before)
            && after > before
        {
            return Err(ApiError::invalid_param(
                "date_after",
                "date_after must not be later than date_before",
            ));
        }

        let os = match self.os.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(parse_os("os", value)?),
            _ => None,
        };
        let os_in = split_list(self.os_in.as_deref())
            .iter()
            .map(|value| parse_os("os__in", value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MetricFilter {
            date_after: self.date_after,
            date_before: self.date_before,
            channel: self
                .channel
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            channel_in: split_list(self.channel_in.as_deref()),
            countries: split_list(self.country.as_deref())
                .into_iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            os,
            os_in,
        })
    }

    fn page(&self, config: &crate::config::ApiConfig) -> Result<Page, ApiError> {
        let limit = self.limit.unwrap_or(config.default_page_size);
        if limit > config.max_page_size {
            return Err(ApiError::invalid_param(
                "limit",
                format!("limit cannot exceed {}", config.max_page_size),
            ));
        }
        Ok(Page {
            limit,
            offset: self.offset.unwrap_or(0),
        })
    }

    fn into_query(self, config: &crate::config::ApiConfig) -> Result<MetricQuery, ApiError> {
        Ok(MetricQuery {
            filter: self.filter()?,
            page: self.page(config)?,
            group_by: split_list(self.group_by.as_deref()),
            display_columns: split_list(self.display_columns.as_deref()),
            ordering: split_list(self.ordering.as_deref()),
        })
    }
}

/// List metrics.
///
/// Aggregates only when both `group_by` and `display_columns` are given;
/// otherwise returns raw records with their per-record `cpi`.
#[tracing::instrument(name = "metrics.list", skip(state, params))]
pub async fn list_metrics(
    State(state): State<AppState>,
    params: Result<Valid<Query<MetricsParams>>, ValidRejection<QueryRejection>>,
) -> Result<Response, ApiError> {
    let Valid(Query(params)) = params?;
    let services = state.services.as_ref().ok_or(ApiError::DatabaseRequired)?;

    let query = params.into_query(&state.config.api)?;
    tracing::debug!(
        group_by = ?query.group_by,
        display_columns = ?query.display_columns,
        aggregated = query.is_aggregation(),
        "Metrics request"
    );

    let response = match services.metrics.query(&query).await? {
        MetricQueryResult::Raw(result) => {
            Json(MetricsResponse::new(result, query.page)).into_response()
        }
        MetricQueryResult::Grouped(result) => {
            Json(MetricsResponse::new(result, query.page)).into_response()
        }
    };
    Ok(response)
}
