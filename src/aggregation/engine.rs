use super::{
    error::AggregationError,
    plan::{AggregateExpr, AggregationPlan, DisplayColumn, Operand},
    schema::{
        CPI, Field, aggregation_function, default_aggregation_function,
        supported_group_by_columns,
    },
};

/// Validate a grouping request and build the plan that computes it.
///
/// Checks run in a fixed order and the first failure is returned:
/// group-by validity (reporting every offending column), then each display
/// column in turn (unsupported field, conflict with a group key, unknown
/// function). `cpi` is resolved last as `sum(spend) / sum(installs)`, reusing
/// the `spend`/`installs` aggregates when they are also requested.
///
/// Duplicate group keys are collapsed. An empty group-by is valid and
/// aggregates over the whole filtered set.
pub fn aggregate<G, D>(
    group_by_columns: &[G],
    display_columns: &[D],
) -> Result<AggregationPlan, AggregationError>
where
    G: AsRef<str>,
    D: AsRef<str>,
{
    let group_by = resolve_group_by(group_by_columns)?;
    let mut plan = AggregationPlan::new(group_by);
    let mut needs_cpi = false;

    for spec in display_columns {
        let spec = spec.as_ref();
        let column = DisplayColumn::parse(spec)?;

        if plan
            .group_by()
            .iter()
            .any(|field| field.as_str() == column.name())
        {
            return Err(AggregationError::ConflictingColumn {
                column: column.name().to_string(),
            });
        }

        let (field, function) = match column {
            DisplayColumn::DerivedRatio => {
                needs_cpi = true;
                continue;
            }
            DisplayColumn::Field { field, function } => (field, function),
        };

        let kind = match function.as_deref() {
            Some(name) => aggregation_function(name).ok_or_else(|| {
                AggregationError::UnsupportedAggregationFunction {
                    column: field.to_string(),
                    function: name.to_string(),
                }
            })?,
            None => default_aggregation_function(),
        };

        if !kind.accepts(field.field_type()) {
            return Err(AggregationError::UnsupportedDisplayColumn {
                column: spec.to_string(),
            });
        }

        plan.insert(field.as_str(), AggregateExpr::Apply { kind, field });
    }

    if needs_cpi {
        let operand = |field: Field| {
            if plan.aggregation(field.as_str()).is_some() {
                Operand::Aggregated(field)
            } else {
                Operand::Sum(field)
            }
        };
        let expr = AggregateExpr::Ratio {
            numerator: operand(Field::Spend),
            denominator: operand(Field::Installs),
        };
        plan.insert(CPI, expr);
    }

    tracing::debug!(
        group_by = ?plan.group_by(),
        outputs = ?plan.aggregations().iter().map(|(n, _)| n).collect::<Vec<_>>(),
        "Built aggregation plan"
    );

    Ok(plan)
}

fn resolve_group_by<G: AsRef<str>>(columns: &[G]) -> Result<Vec<Field>, AggregationError> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut invalid = Vec::new();

    for column in columns {
        let column = column.as_ref();
        match column
            .parse::<Field>()
            .ok()
            .filter(|field| supported_group_by_columns().contains(field))
        {
            Some(field) if !fields.contains(&field) => fields.push(field),
            Some(_) => {}
            None => invalid.push(column.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(AggregationError::UnsupportedGroupByColumn { columns: invalid });
    }
    Ok(fields)
}
