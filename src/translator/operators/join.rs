// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use tracing::debug;

use crate::query_ir::{Lambda, QueryExpr};
use crate::sql_ir::{Join, JoinKind, Projection, Select, SqlExpr, SqlSource};
use crate::translator::{DataSource, TranslationContext, TranslationError, Translator};

use super::projection::build_projections;
use super::OperatorCall;

/// `outer.join(inner, outerKey, innerKey[, result])`
pub(crate) fn translate_join(
    tr: &mut Translator,
    call: &OperatorCall,
    kind: JoinKind,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let result_selector = call.optional_lambda(3)?;
    // A join without a result selector exposes whole rows, so an earlier
    // projection has to become a derived table first.
    let needs_wrap = select.is_paged()
        || select.is_grouped()
        || (result_selector.is_none() && !select.projections.is_empty());
    let (select, outer) = tr.wrap_if(needs_wrap, select, source);

    let inner_expr = tr.visit(call.arg(0)?, ctx)?;
    let (inner_sql, inner) = join_source(inner_expr, call)?;
    debug!(
        "{:?} join of `{}` onto `{}`",
        kind,
        inner_sql.alias(),
        select.alias
    );

    let outer_key = call.lambda(1)?;
    let inner_key = call.lambda(2)?;
    let predicate = key_predicate(tr, outer_key, &outer, inner_key, &inner, ctx)?;

    let projections = match result_selector {
        Some(result) => build_projections(tr, result, vec![outer.clone(), inner.clone()], ctx)?,
        None => vec![
            Projection::new(SqlExpr::wildcard(&row_alias(&outer, &select)), None),
            Projection::new(SqlExpr::wildcard(inner_sql.alias()), None),
        ],
    };

    let alias = tr.next_alias("select");
    Ok(select
        .with_join(Join {
            kind,
            source: inner_sql,
            predicate,
        })
        .with_projections(projections)
        .with_alias(alias))
}

/// The inner side as a JOIN source plus the binding its key lambda sees.
fn join_source(inner: SqlExpr, call: &OperatorCall) -> Result<(SqlSource, DataSource)> {
    match inner {
        SqlExpr::Table(table) => Ok((
            SqlSource::Table(table.clone()),
            DataSource::Table(table),
        )),
        SqlExpr::Select(select) => Ok((
            SqlSource::Select(select.clone()),
            DataSource::Subquery(select),
        )),
        SqlExpr::Union(union) => Ok((
            SqlSource::Union(union.clone()),
            DataSource::Union(union),
        )),
        other => bail!(TranslationError::StructuralPrecondition(format!(
            "`{}` target is a {}, not a table, select or union",
            call.operator.method(),
            other.kind()
        ))),
    }
}

fn row_alias(outer: &DataSource, select: &Select) -> String {
    match outer {
        DataSource::Table(table) => table.alias.clone(),
        DataSource::Subquery(inner) => inner.alias.clone(),
        DataSource::Union(union) => union.alias.clone(),
        _ => select
            .from
            .as_ref()
            .map(|from| from.alias().to_string())
            .unwrap_or_else(|| select.alias.clone()),
    }
}

/// Equality of the two keys. Object-literal keys compare property by property.
fn key_predicate(
    tr: &mut Translator,
    outer_key: &Lambda,
    outer: &DataSource,
    inner_key: &Lambda,
    inner: &DataSource,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    let outer_ctx = ctx.create_child(&outer_key.params, vec![outer.clone()])?;
    let inner_ctx = ctx.create_child(&inner_key.params, vec![inner.clone()])?;

    match (outer_key.body.as_ref(), inner_key.body.as_ref()) {
        (QueryExpr::NewObject(left), QueryExpr::NewObject(right)) => {
            if left.len() != right.len() || left.is_empty() {
                bail!(TranslationError::StructuralPrecondition(format!(
                    "composite join keys have {} and {} parts",
                    left.len(),
                    right.len()
                )));
            }
            let mut predicate: Option<SqlExpr> = None;
            for ((_, l), (_, r)) in left.iter().zip(right) {
                let l = key_value(tr, l, &outer_ctx)?;
                let r = key_value(tr, r, &inner_ctx)?;
                let equal = SqlExpr::equals(l, r);
                predicate = Some(match predicate {
                    Some(existing) => SqlExpr::and(existing, equal),
                    None => equal,
                });
            }
            predicate.ok_or_else(|| {
                anyhow::anyhow!(TranslationError::Internal("empty join key".to_string()))
            })
        }
        (l, r) => {
            let l = key_value(tr, l, &outer_ctx)?;
            let r = key_value(tr, r, &inner_ctx)?;
            Ok(SqlExpr::equals(l, r))
        }
    }
}

fn key_value(tr: &mut Translator, expr: &QueryExpr, ctx: &TranslationContext) -> Result<SqlExpr> {
    let value = tr.visit(expr, ctx)?;
    tr.as_scalar(value)
}
