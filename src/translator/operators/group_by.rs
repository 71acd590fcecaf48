// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `groupBy` and aggregates over the group placeholder.

use anyhow::{anyhow, bail, Result};
use tracing::debug;

use crate::query_ir::{Lambda, QueryExpr};
use crate::sql_ir::{Projection, Select, SqlExpr, WhenClause};
use crate::translator::{DataSource, KeyPart, TranslationContext, TranslationError, Translator};

use super::aggregate::AggregateFunction;
use super::projection::build_projections;
use super::OperatorCall;

/// `groupBy(keySelector[, resultSelector])`
///
/// The result selector sees `(key, group)`. `key` resolves through the
/// captured key parts; aggregates on `group` re-resolve against the source the
/// rows came from.
pub(crate) fn translate_group_by(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let key_selector = call.lambda(0)?;
    let result_selector = call.optional_lambda(1)?;

    let needs_wrap = select.is_paged() || select.is_grouped();
    let (select, source) = tr.wrap_if(needs_wrap, select, source);

    let parts = capture_key(tr, key_selector, source.clone(), ctx)?;
    let group_by: Vec<SqlExpr> = parts
        .iter()
        .filter(|part| !matches!(part.expression, SqlExpr::Constant(_)))
        .map(|part| part.expression.clone())
        .collect();
    debug!("grouping `{}` by {} key(s)", select.alias, group_by.len());

    let projections = match result_selector {
        Some(result) => build_projections(
            tr,
            result,
            vec![
                DataSource::GroupKey(parts),
                DataSource::Group(Box::new(source)),
            ],
            ctx,
        )?,
        None => parts
            .into_iter()
            .map(|part| {
                let alias = match (&part.name, &part.expression) {
                    (Some(name), _) => Some(name.clone()),
                    (None, SqlExpr::Column(_)) => None,
                    (None, _) => Some(tr.config().scalar_alias.clone()),
                };
                Projection::new(part.expression, alias)
            })
            .collect(),
    };

    let alias = tr.next_alias("select");
    let mut select = select.with_projections(projections).with_alias(alias);
    select.group_by = group_by;
    select.orderings.clear();
    Ok(select)
}

fn capture_key(
    tr: &mut Translator,
    selector: &Lambda,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Vec<KeyPart>> {
    let child = ctx.create_child(&selector.params, vec![source])?;
    match selector.body.as_ref() {
        QueryExpr::NewObject(properties) => properties
            .iter()
            .map(|(name, value)| {
                Ok(KeyPart {
                    name: Some(name.clone()),
                    expression: key_part(tr, name, value, &child)?,
                })
            })
            .collect(),
        body => Ok(vec![KeyPart {
            name: None,
            expression: key_part(tr, "key", body, &child)?,
        }]),
    }
}

fn key_part(
    tr: &mut Translator,
    name: &str,
    value: &QueryExpr,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    match tr.visit(value, ctx)? {
        SqlExpr::Column(column) if !column.is_wildcard() => Ok(SqlExpr::Column(column)),
        expr @ (SqlExpr::Constant(_) | SqlExpr::FunctionCall { .. }) => Ok(expr),
        other => bail!(TranslationError::Unsupported(format!(
            "group key `{}` is a {}; keys must be columns, constants or function calls",
            name,
            other.kind()
        ))),
    }
}

/// `group.count()`, `group.count(pred)`, `group.sum(x => ...)` and friends,
/// when `receiver` is the group placeholder. Returns `Ok(None)` otherwise.
pub(crate) fn translate_group_aggregate(
    tr: &mut Translator,
    receiver: &QueryExpr,
    method: &str,
    args: &[QueryExpr],
    ctx: &TranslationContext,
) -> Result<Option<SqlExpr>> {
    let original = match receiver {
        QueryExpr::Parameter(param) => match ctx.resolve(param) {
            Some(DataSource::Group(original)) => original.as_ref().clone(),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    let function = AggregateFunction::from_method(method).ok_or_else(|| {
        anyhow!(TranslationError::Unsupported(format!(
            "`{}` on a group; only aggregates are supported",
            method
        )))
    })?;
    let lambda = match args {
        [] => None,
        [QueryExpr::Lambda(lambda)] => Some(lambda),
        _ => bail!(TranslationError::Arity(format!(
            "`{}` on a group takes at most one lambda",
            method
        ))),
    };

    let argument = match (function, lambda) {
        (AggregateFunction::Count, None) => SqlExpr::constant(1),
        (AggregateFunction::Count, Some(predicate)) => {
            let condition = tr.visit_in_context(predicate, vec![original], ctx)?;
            SqlExpr::Case {
                when_clauses: vec![WhenClause {
                    when: tr.as_condition(condition)?,
                    then: SqlExpr::constant(1),
                }],
                else_result: None,
            }
        }
        (_, Some(selector)) => {
            let value = tr.visit_in_context(selector, vec![original], ctx)?;
            tr.as_scalar(value)?
        }
        (_, None) => bail!(TranslationError::Arity(format!(
            "`{}` on a group needs a selector",
            method
        ))),
    };
    Ok(Some(SqlExpr::function(function.sql_name(), vec![argument])))
}
