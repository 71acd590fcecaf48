// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};

use crate::sql_ir::{Ordering, Select, SortDirection};
use crate::translator::{DataSource, TranslationContext, TranslationError, Translator};

use super::OperatorCall;

/// `orderBy`/`orderByDescending` replace any earlier ordering.
pub(crate) fn translate_order_by(
    tr: &mut Translator,
    call: &OperatorCall,
    direction: SortDirection,
    select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    let paged = select.is_paged();
    let (select, source) = tr.wrap_if(paged, select, source);
    let ordering = order_key(tr, call, direction, source, ctx)?;
    Ok(select.with_orderings(vec![ordering]))
}

/// `thenBy`/`thenByDescending` append to the existing ordering.
pub(crate) fn translate_then_by(
    tr: &mut Translator,
    call: &OperatorCall,
    direction: SortDirection,
    mut select: Select,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Select> {
    if select.orderings.is_empty() {
        bail!(TranslationError::StructuralPrecondition(format!(
            "`{}` requires a preceding orderBy",
            call.operator.method()
        )));
    }
    let ordering = order_key(tr, call, direction, source, ctx)?;
    select.orderings.push(ordering);
    Ok(select)
}

fn order_key(
    tr: &mut Translator,
    call: &OperatorCall,
    direction: SortDirection,
    source: DataSource,
    ctx: &TranslationContext,
) -> Result<Ordering> {
    let key = call.lambda(0)?;
    let expression = tr.visit_in_context(key, vec![source], ctx)?;
    Ok(Ordering {
        expression: tr.as_scalar(expression)?,
        direction,
    })
}

#[cfg(test)]
mod tests {
    use crate::query_ir::{Param, QueryExpr};
    use crate::sql_ir::{SortDirection, SqlExpr};
    use crate::translator::{TranslationError, Translator};

    fn by(member: &str) -> QueryExpr {
        let u = Param::new("u");
        QueryExpr::lambda(
            vec![u.clone()],
            QueryExpr::member(QueryExpr::param(&u), member),
        )
    }

    fn orderings_of(query: &QueryExpr) -> Vec<(SqlExpr, SortDirection)> {
        match Translator::new().translate(query).unwrap() {
            SqlExpr::Select(select) => select
                .orderings
                .iter()
                .map(|o| (o.expression.clone(), o.direction))
                .collect(),
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_order_by_replaces_then_by_appends() {
        let query = QueryExpr::call(
            QueryExpr::call(
                QueryExpr::call(QueryExpr::table("Users"), "orderBy", vec![by("age")]),
                "orderByDescending",
                vec![by("name")],
            ),
            "thenBy",
            vec![by("id")],
        );
        assert_eq!(
            orderings_of(&query),
            vec![
                (SqlExpr::column("u", "name"), SortDirection::Descending),
                (SqlExpr::column("u", "id"), SortDirection::Ascending),
            ]
        );
    }

    #[test]
    fn test_then_by_without_order_by() {
        let query = QueryExpr::call(QueryExpr::table("Users"), "thenBy", vec![by("age")]);
        let err = Translator::new().translate(&query).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranslationError>(),
            Some(TranslationError::StructuralPrecondition(_))
        ));
    }
}
