//! Fixed schema of the metrics table and the aggregation functions allowed on it.
//!
//! Everything here is static data. The engine consults it to decide which
//! columns may be grouped on, which may be aggregated, and which function
//! names are accepted as `field__function` suffixes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Name of the derived cost-per-install metric (`spend / installs`).
pub const CPI: &str = "cpi";

/// A stored attribute of a metric record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Channel,
    Country,
    Os,
    Impressions,
    Clicks,
    Installs,
    Spend,
    Revenue,
}

/// Storage type of a field, used to decide which aggregations apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Date,
    Text,
    Integer,
    Float,
}

impl Field {
    /// All fields in table order.
    pub const ALL: [Field; 9] = [
        Field::Date,
        Field::Channel,
        Field::Country,
        Field::Os,
        Field::Impressions,
        Field::Clicks,
        Field::Installs,
        Field::Spend,
        Field::Revenue,
    ];

    /// Column name, identical to the public field name.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Channel => "channel",
            Field::Country => "country",
            Field::Os => "os",
            Field::Impressions => "impressions",
            Field::Clicks => "clicks",
            Field::Installs => "installs",
            Field::Spend => "spend",
            Field::Revenue => "revenue",
        }
    }

    pub fn field_type(self) -> FieldType {
        match self {
            Field::Date => FieldType::Date,
            Field::Channel | Field::Country | Field::Os => FieldType::Text,
            Field::Impressions | Field::Clicks | Field::Installs => FieldType::Integer,
            Field::Spend | Field::Revenue => FieldType::Float,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or(())
    }
}

/// Fields that can be used as grouping keys.
pub fn supported_group_by_columns() -> &'static [Field] {
    &[Field::Date, Field::Channel, Field::Country, Field::Os]
}

/// Fields that are never valid display columns, regardless of grouping.
pub fn unsupported_display_columns() -> &'static [Field] {
    &[Field::Date]
}

/// Aggregation applied to a single display column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
}

impl AggregationKind {
    pub fn name(self) -> &'static str {
        match self {
            AggregationKind::Sum => "sum",
        }
    }

    /// Whether this aggregation is defined for values of the given type.
    pub fn accepts(self, field_type: FieldType) -> bool {
        match self {
            AggregationKind::Sum => matches!(field_type, FieldType::Integer | FieldType::Float),
        }
    }
}

const AGGREGATION_FUNCTIONS: &[(&str, AggregationKind)] = &[("sum", AggregationKind::Sum)];

/// Function names accepted as a `__function` suffix, with the aggregation each selects.
pub fn supported_aggregation_functions() -> &'static [(&'static str, AggregationKind)] {
    AGGREGATION_FUNCTIONS
}

/// Aggregation used when a display column has no suffix.
pub fn default_aggregation_function() -> AggregationKind {
    AggregationKind::Sum
}

/// Look up an aggregation by its suffix name.
pub fn aggregation_function(name: &str) -> Option<AggregationKind> {
    supported_aggregation_functions()
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, kind)| *kind)
}
