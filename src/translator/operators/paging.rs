// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};

use crate::sql_ir::Select;
use crate::translator::{static_eval, TranslationContext, TranslationError};

use super::OperatorCall;

/// `skip(n)`: offsets add up, and an existing limit shrinks by `n`.
pub(crate) fn translate_skip(
    call: &OperatorCall,
    mut select: Select,
    ctx: &TranslationContext,
) -> Result<Select> {
    let count = row_count(call, ctx)?;
    select.offset = Some(select.offset.unwrap_or(0).saturating_add(count));
    if let Some(limit) = select.limit {
        select.limit = Some(limit.saturating_sub(count));
    }
    Ok(select)
}

/// `take(n)`: the smaller of `n` and any existing limit wins.
pub(crate) fn translate_take(
    call: &OperatorCall,
    mut select: Select,
    ctx: &TranslationContext,
) -> Result<Select> {
    let count = row_count(call, ctx)?;
    select.limit = Some(select.limit.map_or(count, |limit| limit.min(count)));
    Ok(select)
}

fn row_count(call: &OperatorCall, ctx: &TranslationContext) -> Result<u64> {
    let method = call.operator.method();
    let arg = call.arg(0)?;
    match static_eval(arg, ctx) {
        Some(value) => match value.as_non_negative_integer() {
            Some(count) => Ok(count),
            None => bail!(TranslationError::InvalidLiteral(format!(
                "`{}` expects a non-negative integer, got {}",
                method, value
            ))),
        },
        None => bail!(TranslationError::InvalidLiteral(format!(
            "`{}` argument `{}` is not a constant",
            method, arg
        ))),
    }
}
