use serde::Serialize;

use super::{
    error::AggregationError,
    schema::{AggregationKind, CPI, Field, unsupported_display_columns},
};

/// A parsed display column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayColumn {
    /// A stored field, optionally with an explicit `__function` suffix.
    Field {
        field: Field,
        function: Option<String>,
    },
    /// The derived `cpi` ratio.
    DerivedRatio,
}

impl DisplayColumn {
    /// Parse `field` or `field__function`, splitting on the first `__`.
    ///
    /// Only the field half is checked here. Function names are resolved by
    /// the engine after the group-by conflict check.
    pub fn parse(spec: &str) -> Result<Self, AggregationError> {
        let (name, function) = match spec.split_once("__") {
            Some((name, function)) => (name, Some(function)),
            None => (spec, None),
        };

        if name == CPI {
            return Ok(DisplayColumn::DerivedRatio);
        }

        let field = name
            .parse::<Field>()
            .ok()
            .filter(|field| !unsupported_display_columns().contains(field))
            .ok_or_else(|| AggregationError::UnsupportedDisplayColumn {
                column: name.to_string(),
            })?;

        Ok(DisplayColumn::Field {
            field,
            function: function.map(str::to_string),
        })
    }

    /// Output column name this display column produces.
    pub fn name(&self) -> &str {
        match self {
            DisplayColumn::Field { field, .. } => field.as_str(),
            DisplayColumn::DerivedRatio => CPI,
        }
    }
}

/// One side of a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "field")]
pub enum Operand {
    /// Reuse the aggregate already produced for this field's output column.
    Aggregated(Field),
    /// Sum the field independently of the display columns.
    Sum(Field),
}

impl Operand {
    pub fn field(self) -> Field {
        match self {
            Operand::Aggregated(field) | Operand::Sum(field) => field,
        }
    }
}

/// Expression computed for one output column of a grouped query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AggregateExpr {
    Apply { kind: AggregationKind, field: Field },
    Ratio { numerator: Operand, denominator: Operand },
}

/// Validated grouping plus the ordered output columns to compute per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationPlan {
    group_by: Vec<Field>,
    aggregations: Vec<(String, AggregateExpr)>,
}

impl AggregationPlan {
    pub(super) fn new(group_by: Vec<Field>) -> Self {
        Self {
            group_by,
            aggregations: Vec::new(),
        }
    }

    /// Insert or replace the expression for `name`, keeping first-seen position.
    pub(super) fn insert(&mut self, name: &str, expr: AggregateExpr) {
        match self.aggregations.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = expr,
            None => self.aggregations.push((name.to_string(), expr)),
        }
    }

    pub fn group_by(&self) -> &[Field] {
        &self.group_by
    }

    pub fn aggregations(&self) -> &[(String, AggregateExpr)] {
        &self.aggregations
    }

    pub fn aggregation(&self, name: &str) -> Option<&AggregateExpr> {
        self.aggregations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expr)| expr)
    }

    /// Output column names: group keys first, then aggregations.
    pub fn output_columns(&self) -> impl Iterator<Item = &str> {
        self.group_by
            .iter()
            .map(|field| field.as_str())
            .chain(self.aggregations.iter().map(|(name, _)| name.as_str()))
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.output_columns().any(|column| column == name)
    }
}
