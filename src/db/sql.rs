//! SQL rendering shared by the SQLite and PostgreSQL metric repositories.
//!
//! Filters and aggregation plans are rendered with `?` placeholders and a list
//! of bind values in order. The PostgreSQL backend renumbers placeholders to
//! `$N` before executing.
//!
//! Identifiers only ever come from [`Field`] and `OrderKey`, never from
//! request strings.

use chrono::NaiveDate;

use super::repos::{MetricFilter, OrderBy, SortOrder};
use crate::aggregation::{
    AggregateExpr, AggregationKind, AggregationPlan, Field, FieldType, Operand,
};

/// SQL dialect differences that matter for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn float_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "REAL",
            Dialect::Postgres => "DOUBLE PRECISION",
        }
    }
}

/// A rendered WHERE clause.
#[derive(Debug, Clone)]
pub struct SqlFilter {
    /// SQL WHERE clause fragment (e.g., "date >= ? AND channel IN (?, ?)")
    pub where_clause: String,
    /// Bind values in order
    pub bindings: Vec<SqlValue>,
}

/// SQL bind value types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Date(NaiveDate),
}

/// How a result column is decoded from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    Text,
    Int,
    Float,
}

/// Rendered statements for a grouped query.
#[derive(Debug, Clone)]
pub struct GroupedSql {
    /// Data query; binds are the filter bindings then LIMIT and OFFSET.
    pub data: String,
    /// Group count query; binds are the filter bindings. `None` when the plan
    /// has no group keys and therefore always yields a single row.
    pub count: Option<String>,
    /// Output columns in select order.
    pub columns: Vec<(String, ColumnKind)>,
}

/// Rendered statements for a raw listing.
#[derive(Debug, Clone)]
pub struct RawSql {
    pub data: String,
    pub count: String,
}

pub fn filter_to_sql(filter: &MetricFilter) -> SqlFilter {
    let mut clauses = Vec::new();
    let mut bindings = Vec::new();

    if let Some(after) = filter.date_after {
        clauses.push("date >= ?".to_string());
        bindings.push(SqlValue::Date(after));
    }
    if let Some(before) = filter.date_before {
        clauses.push("date <= ?".to_string());
        bindings.push(SqlValue::Date(before));
    }
    if let Some(channel) = &filter.channel {
        clauses.push("channel = ?".to_string());
        bindings.push(SqlValue::String(channel.clone()));
    }
    push_in_clause(
        &mut clauses,
        &mut bindings,
        Field::Channel,
        filter.channel_in.iter().cloned(),
    );
    push_in_clause(
        &mut clauses,
        &mut bindings,
        Field::Country,
        filter.countries.iter().cloned(),
    );
    if let Some(os) = filter.os {
        clauses.push("os = ?".to_string());
        bindings.push(SqlValue::String(os.as_str().to_string()));
    }
    push_in_clause(
        &mut clauses,
        &mut bindings,
        Field::Os,
        filter.os_in.iter().map(|os| os.as_str().to_string()),
    );

    let where_clause = if clauses.is_empty() {
        "1 = 1".to_string()
    } else {
        clauses.join(" AND ")
    };

    SqlFilter {
        where_clause,
        bindings,
    }
}

fn push_in_clause(
    clauses: &mut Vec<String>,
    bindings: &mut Vec<SqlValue>,
    field: Field,
    values: impl Iterator<Item = String>,
) {
    let start = bindings.len();
    bindings.extend(values.map(SqlValue::String));
    let count = bindings.len() - start;
    if count > 0 {
        let placeholders = vec!["?"; count].join(", ");
        clauses.push(format!("{} IN ({})", field.as_str(), placeholders));
    }
}

fn aggregate_function(kind: AggregationKind) -> &'static str {
    match kind {
        AggregationKind::Sum => "SUM",
    }
}

fn apply_expr(dialect: Dialect, kind: AggregationKind, field: Field) -> String {
    let cast = match field.field_type() {
        FieldType::Integer => "BIGINT",
        _ => dialect.float_type(),
    };
    format!(
        "CAST({}({}) AS {})",
        aggregate_function(kind),
        field.as_str(),
        cast
    )
}

fn operand_expr(dialect: Dialect, plan: &AggregationPlan, operand: Operand) -> String {
    if let Operand::Aggregated(field) = operand
        && let Some(AggregateExpr::Apply { kind, field }) = plan.aggregation(field.as_str())
    {
        return apply_expr(dialect, *kind, *field);
    }
    apply_expr(dialect, AggregationKind::Sum, operand.field())
}

/// Render one plan output as a SQL expression.
pub fn aggregate_expr(dialect: Dialect, plan: &AggregationPlan, expr: &AggregateExpr) -> String {
    match expr {
        AggregateExpr::Apply { kind, field } => apply_expr(dialect, *kind, *field),
        AggregateExpr::Ratio {
            numerator,
            denominator,
        } => {
            let float = dialect.float_type();
            format!(
                "CAST({} AS {float}) / NULLIF(CAST({} AS {float}), 0)",
                operand_expr(dialect, plan, *numerator),
                operand_expr(dialect, plan, *denominator),
            )
        }
    }
}

fn column_kind(expr: &AggregateExpr) -> ColumnKind {
    match expr {
        AggregateExpr::Apply { field, .. } if field.field_type() == FieldType::Integer => {
            ColumnKind::Int
        }
        _ => ColumnKind::Float,
    }
}

fn order_clause(ordering: &[OrderBy], tie_breakers: &[&str]) -> String {
    let mut terms: Vec<String> = Vec::with_capacity(ordering.len() + tie_breakers.len());
    let mut seen: Vec<&str> = Vec::new();
    for order in ordering {
        let name = order.key.as_str();
        if !seen.contains(&name) {
            seen.push(name);
            terms.push(format!("{} {}", name, order.order.as_sql()));
        }
    }
    for name in tie_breakers {
        if !seen.contains(name) {
            seen.push(name);
            terms.push(format!("{} {}", name, SortOrder::Asc.as_sql()));
        }
    }
    terms.join(", ")
}

/// Render the data and count statements for an aggregation plan.
///
/// `ordering` keys must be outputs of the plan.
pub fn grouped_sql(
    dialect: Dialect,
    filter: &SqlFilter,
    plan: &AggregationPlan,
    ordering: &[OrderBy],
) -> GroupedSql {
    let keys: Vec<&str> = plan.group_by().iter().map(|f| f.as_str()).collect();

    let mut select = Vec::new();
    let mut columns = Vec::new();
    for field in plan.group_by() {
        select.push(field.as_str().to_string());
        let kind = match field.field_type() {
            FieldType::Date => ColumnKind::Date,
            _ => ColumnKind::Text,
        };
        columns.push((field.as_str().to_string(), kind));
    }
    for (name, expr) in plan.aggregations() {
        select.push(format!("{} AS {}", aggregate_expr(dialect, plan, expr), name));
        columns.push((name.clone(), column_kind(expr)));
    }

    let mut data = format!(
        "SELECT {} FROM metrics WHERE {}",
        select.join(", "),
        filter.where_clause
    );
    if !keys.is_empty() {
        data.push_str(&format!(" GROUP BY {}", keys.join(", ")));
    }
    let order = order_clause(ordering, &keys);
    if !order.is_empty() {
        data.push_str(&format!(" ORDER BY {}", order));
    }
    data.push_str(" LIMIT ? OFFSET ?");

    let count = (!keys.is_empty()).then(|| {
        format!(
            "SELECT COUNT(*) AS cnt FROM (SELECT 1 AS one FROM metrics WHERE {} GROUP BY {}) AS grouped",
            filter.where_clause,
            keys.join(", ")
        )
    });

    GroupedSql {
        data,
        count,
        columns,
    }
}

/// Render the data and count statements for a raw listing.
pub fn raw_sql(dialect: Dialect, filter: &SqlFilter, ordering: &[OrderBy]) -> RawSql {
    let data = format!(
        "SELECT date, channel, country, os, impressions, clicks, installs, spend, revenue, \
         CAST(spend AS {}) / NULLIF(installs, 0) AS cpi \
         FROM metrics WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        dialect.float_type(),
        filter.where_clause,
        order_clause(ordering, &["id"]),
    );
    let count = format!(
        "SELECT COUNT(*) AS cnt FROM metrics WHERE {}",
        filter.where_clause
    );
    RawSql { data, count }
}
