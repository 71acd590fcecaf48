// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;

use crate::sql_ir::{Projection, Select, SqlExpr};
use crate::translator::{DataSource, TranslationContext, Translator};

use super::filter::apply_predicate;
use super::OperatorCall;

/// `any([predicate])` becomes `EXISTS (SELECT 1 ...)`.
pub(crate) fn translate_any(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    let paged = select.is_paged();
    let (select, source) = tr.wrap_if(paged, select, source);
    let select = match call.optional_lambda(0)? {
        Some(predicate) => apply_predicate(tr, predicate, select, source, ctx)?,
        None => select,
    };
    Ok(SqlExpr::Exists(Box::new(reduce(select))))
}

/// `all(predicate)` becomes `NOT EXISTS (SELECT 1 ... WHERE NOT (predicate))`.
pub(crate) fn translate_all(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    let predicate = call.lambda(0)?;
    let paged = select.is_paged();
    let (select, source) = tr.wrap_if(paged, select, source);

    let condition = tr.visit_in_context(predicate, vec![source], ctx)?;
    let violation = SqlExpr::Not(Box::new(tr.as_condition(condition)?));
    let select = if select.is_grouped() {
        select.with_having(violation)
    } else {
        select.with_predicate(violation)
    };
    Ok(SqlExpr::Not(Box::new(SqlExpr::Exists(Box::new(reduce(
        select,
    ))))))
}

fn reduce(select: Select) -> Select {
    select
        .without_paging()
        .with_projections(vec![Projection::new(SqlExpr::constant(1), None)])
}
