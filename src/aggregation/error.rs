use thiserror::Error;

/// Reasons an aggregation request is rejected.
///
/// All of these are caller errors detected before any query runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("Unsupported group by column(s): {}", .columns.join(", "))]
    UnsupportedGroupByColumn { columns: Vec<String> },

    #[error("Unsupported display column: {column}")]
    UnsupportedDisplayColumn { column: String },

    #[error("Column '{column}' cannot be used in both group by and display columns")]
    ConflictingColumn { column: String },

    #[error("Unsupported aggregation function '{function}' for column '{column}'")]
    UnsupportedAggregationFunction { column: String, function: String },
}

impl AggregationError {
    /// Machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            AggregationError::UnsupportedGroupByColumn { .. } => "unsupported_group_by_column",
            AggregationError::UnsupportedDisplayColumn { .. } => "unsupported_display_column",
            AggregationError::ConflictingColumn { .. } => "conflicting_column",
            AggregationError::UnsupportedAggregationFunction { .. } => {
                "unsupported_aggregation_function"
            }
        }
    }

    /// The request parameter the error refers to.
    pub fn param(&self) -> &'static str {
        match self {
            AggregationError::UnsupportedGroupByColumn { .. } => "group_by",
            _ => "display_columns",
        }
    }
}
