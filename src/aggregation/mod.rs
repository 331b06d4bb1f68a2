//! Aggregation engine: turns `group_by` and `display_columns` request lists
//! into a validated [`AggregationPlan`] for the storage layer to execute.
//!
//! The engine is pure. It never touches storage or result rows.

mod engine;
mod error;
mod plan;
mod schema;

pub use engine::aggregate;
pub use error::AggregationError;
pub use plan::{AggregateExpr, AggregationPlan, Operand};
pub use schema::{AggregationKind, CPI, Field, FieldType};
