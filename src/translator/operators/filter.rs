// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use tracing::debug;

use crate::query_ir::Lambda;
use crate::sql_ir::Select;
use crate::translator::{DataSource, TranslationContext, Translator};

use super::OperatorCall;

pub(crate) fn translate_where(
    tr: &mut Translator,
    call: &OperatorCall,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let predicate = call.lambda(0)?;
    apply_predicate(tr, predicate, select, source, ctx)
}

/// AND a predicate into the select.
///
/// A grouped select takes the predicate as HAVING. Whether the select is
/// grouped is read from the select itself, so operators between `groupBy` and
/// `where` do not change the routing.
pub(crate) fn apply_predicate(
    tr: &mut Translator,
    predicate: &Lambda,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let paged = select.is_paged();
    let (select, source) = tr.wrap_if(paged, select, source);

    let condition = tr.visit_in_context(predicate, vec![source], ctx)?;
    let condition = tr.as_condition(condition)?;

    if select.is_grouped() {
        debug!("predicate on grouped select `{}` becomes HAVING", select.alias);
        Ok(select.with_having(condition))
    } else {
        Ok(select.with_predicate(condition))
    }
}
