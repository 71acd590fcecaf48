// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Projection building and nested-query materialization.

use anyhow::{bail, Result};
use tracing::trace;

use crate::query_ir::{Lambda, QueryExpr};
use crate::sql_ir::{Projection, Select, SqlExpr};
use crate::translator::{flag, DataSource, TranslationContext, TranslationError, Translator};

use super::OperatorCall;

pub(crate) fn translate_select(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let selector = call.lambda(0)?;
    if is_identity(selector) {
        trace!("identity projection on `{}` skipped", select.alias);
        return Ok(select);
    }

    let projections = build_projections(tr, selector, vec![source], ctx)?;
    let alias = tr.next_alias("select");
    Ok(select.with_projections(projections).with_alias(alias))
}

/// `x => x`
fn is_identity(lambda: &Lambda) -> bool {
    match (lambda.params.as_slice(), lambda.body.as_ref()) {
        ([param], QueryExpr::Parameter(body)) => param == body,
        _ => false,
    }
}

/// Build the projection list of a selector lambda whose parameters are bound
/// to `sources`.
pub(crate) fn build_projections(
    tr: &mut Translator,
    selector: &Lambda,
    sources: Vec<DataSource>,
    ctx: &TranslationContext,
) -> Result<Vec<Projection>> {
    let child = ctx.create_child(&selector.params, sources)?;
    match selector.body.as_ref() {
        QueryExpr::NewObject(properties) => {
            let mut projections = Vec::with_capacity(properties.len());
            for (name, value) in properties {
                flatten_property(tr, name, value, &child, &mut projections)?;
            }
            Ok(projections)
        }
        QueryExpr::Parameter(param) => match child.resolve(param) {
            Some(source) => row_projections(tr, source),
            None => single_projection(tr, &selector.body, &child),
        },
        body => single_projection(tr, body, &child),
    }
}

fn single_projection(
    tr: &mut Translator,
    body: &QueryExpr,
    ctx: &TranslationContext,
) -> Result<Vec<Projection>> {
    let value = tr.visit(body, ctx)?;
    let value = materialize_value(tr, value)?;
    let alias = match &value {
        SqlExpr::Column(_) => None,
        _ => Some(tr.config().scalar_alias.clone()),
    };
    Ok(vec![Projection::new(value, alias)])
}

/// Projections for a bare parameter: every column of the row it stands for.
fn row_projections(tr: &Translator, source: &DataSource) -> Result<Vec<Projection>> {
    Ok(match source {
        DataSource::Table(table) => vec![Projection::new(SqlExpr::wildcard(&table.alias), None)],
        DataSource::Subquery(select) => {
            vec![Projection::new(SqlExpr::wildcard(&select.alias), None)]
        }
        DataSource::Union(union) => vec![Projection::new(SqlExpr::wildcard(&union.alias), None)],
        DataSource::Select(select) => {
            if !select.projections.is_empty() {
                select.projections.clone()
            } else {
                match &select.from {
                    Some(from) => vec![Projection::new(SqlExpr::wildcard(from.alias()), None)],
                    None => bail!(TranslationError::Internal(format!(
                        "select `{}` has neither projections nor a source",
                        select.alias
                    ))),
                }
            }
        }
        DataSource::GroupKey(parts) => parts
            .iter()
            .map(|part| {
                let alias = match (&part.name, &part.expression) {
                    (Some(name), _) => Some(name.clone()),
                    (None, SqlExpr::Column(_)) => None,
                    (None, _) => Some(tr.config().scalar_alias.clone()),
                };
                Projection::new(part.expression.clone(), alias)
            })
            .collect(),
        DataSource::Group(_) => bail!(TranslationError::Unsupported(
            "a group must be aggregated before it can be projected".to_string()
        )),
    })
}

/// Nested objects become dotted aliases, which `FOR JSON PATH` turns back
/// into nested objects.
fn flatten_property(
    tr: &mut Translator,
    name: &str,
    value: &QueryExpr,
    ctx: &TranslationContext,
    out: &mut Vec<Projection>,
) -> Result<()> {
    match value {
        QueryExpr::NewObject(properties) => {
            for (child, value) in properties {
                flatten_property(tr, &format!("{}.{}", name, child), value, ctx, out)?;
            }
            return Ok(());
        }
        QueryExpr::Parameter(param) => match ctx.resolve(param) {
            Some(DataSource::GroupKey(parts)) => {
                for part in parts {
                    let alias = match &part.name {
                        Some(part_name) => format!("{}.{}", name, part_name),
                        None => name.to_string(),
                    };
                    out.push(Projection::new(part.expression.clone(), Some(alias)));
                }
                return Ok(());
            }
            Some(source) => bail!(TranslationError::Unsupported(format!(
                "property `{}` projects a whole {} row",
                name,
                source.kind()
            ))),
            None => {}
        },
        _ => {}
    }

    let expr = tr.visit(value, ctx)?;
    let expr = materialize_value(tr, expr)?;
    out.push(Projection::new(expr, Some(name.to_string())));
    Ok(())
}

/// Make a lowered value fit for a SELECT list.
pub(crate) fn materialize_value(tr: &mut Translator, value: SqlExpr) -> Result<SqlExpr> {
    match value {
        SqlExpr::Select(select) => Ok(materialize_subquery(tr, *select)),
        SqlExpr::Table(_) | SqlExpr::Union(_) => {
            let (select, _) = tr.normalize(value)?;
            Ok(materialize_subquery(tr, select))
        }
        predicate if predicate.is_predicate() => Ok(flag(predicate)),
        other => Ok(other),
    }
}

/// A lone simple aggregate stays a scalar subquery; anything else is
/// aggregated to JSON.
pub(crate) fn materialize_subquery(tr: &Translator, select: Select) -> SqlExpr {
    if select.single_aggregate().is_some() {
        return SqlExpr::ScalarSubquery(Box::new(select));
    }
    let without_array_wrapper = select.limit == Some(1);
    SqlExpr::ScalarSubqueryAsJson {
        select: Box::new(select),
        mode: tr.config().json_mode,
        include_nulls: tr.config().json_include_nulls,
        without_array_wrapper,
    }
}
