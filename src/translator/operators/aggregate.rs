// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};

use crate::sql_ir::{Projection, Select, SqlExpr};
use crate::translator::{DataSource, TranslationContext, TranslationError, Translator};

use super::filter::apply_predicate;
use super::OperatorCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "count" => AggregateFunction::Count,
            "sum" => AggregateFunction::Sum,
            "avg" => AggregateFunction::Avg,
            "min" => AggregateFunction::Min,
            "max" => AggregateFunction::Max,
            _ => return None,
        })
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// Replace the projection list with a single aggregate.
///
/// Paged or grouped input is first wrapped as a derived table so the aggregate
/// sees the rows the paging or grouping produced.
pub(crate) fn translate_aggregate(
    tr: &mut Translator,
    call: &OperatorCall,
    function: AggregateFunction,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let needs_wrap = select.is_paged() || select.is_grouped();
    let (select, source) = tr.wrap_if(needs_wrap, select, source);
    let lambda = call.optional_lambda(0)?;

    let (select, argument) = match function {
        AggregateFunction::Count => {
            let select = match lambda {
                Some(predicate) => apply_predicate(tr, predicate, select, source, ctx)?,
                None => select,
            };
            (select, SqlExpr::constant(1))
        }
        _ => {
            let argument = match lambda {
                Some(selector) => {
                    let value = tr.visit_in_context(selector, vec![source], ctx)?;
                    tr.as_scalar(value)?
                }
                None => match select.projections.as_slice() {
                    [only] if !matches!(&only.expression, SqlExpr::Column(c) if c.is_wildcard()) => {
                        only.expression.clone()
                    }
                    _ => bail!(TranslationError::Arity(format!(
                        "`{}` needs a selector unless the query projects a single value",
                        call.operator.method()
                    ))),
                },
            };
            (select, argument)
        }
    };

    let mut select = select.with_projections(vec![Projection::new(
        SqlExpr::function(function.sql_name(), vec![argument]),
        None,
    )]);
    select.orderings.clear();
    Ok(select)
}
