// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};

use crate::sql_ir::{Select, SqlExpr};
use crate::translator::{DataSource, TranslationContext, TranslationError, Translator};

use super::filter::apply_predicate;
use super::{OperatorCall, QueryOperator};

/// `first`, `firstOrDefault`, `single` and `singleOrDefault`.
///
/// `single` fetches two rows so the caller can detect a second match. At the
/// top level every named projection is renamed to the configured sentinel so
/// the executor knows which terminal produced the row.
pub(crate) fn translate_first_or_single(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let (rows, sentinel) = match call.operator {
        QueryOperator::First | QueryOperator::FirstOrDefault => {
            (1, tr.config().first_alias.clone())
        }
        QueryOperator::Single | QueryOperator::SingleOrDefault => {
            (2, tr.config().single_alias.clone())
        }
        other => bail!(TranslationError::Internal(format!(
            "`{}` is not a first/single operator",
            other.method()
        ))),
    };

    let mut select = match call.optional_lambda(0)? {
        Some(predicate) => apply_predicate(tr, predicate, select, source, ctx)?,
        None => select,
    };
    select.limit = Some(select.limit.map_or(rows, |limit| limit.min(rows)));

    if ctx.is_root() {
        for projection in select.projections.iter_mut() {
            let wildcard = matches!(&projection.expression, SqlExpr::Column(c) if c.is_wildcard());
            if !wildcard {
                projection.alias = Some(sentinel.clone());
            }
        }
    }
    Ok(select)
}
