// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};

use crate::sql_ir::{Select, SqlExpr, Union};
use crate::translator::{TranslationContext, TranslationError, Translator};

use super::{OperatorCall, QueryOperator};

/// `union` (distinct) and `concat` (UNION ALL).
///
/// Unions of the same kind flatten into one list of selects.
pub(crate) fn translate_union(
    tr: &mut Translator,
    call: &OperatorCall,
    receiver: SqlExpr,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    let distinct = call.operator == QueryOperator::Union;
    let other = tr.visit(call.arg(0)?, ctx)?;

    let (mut sources, alias) = match receiver {
        SqlExpr::Union(union) if union.distinct == distinct => (union.sources, Some(union.alias)),
        side => (vec![union_side(tr, call, side)?], None),
    };
    match other {
        SqlExpr::Union(union) if union.distinct == distinct => sources.extend(union.sources),
        side => sources.push(union_side(tr, call, side)?),
    }

    let alias = match alias {
        Some(alias) => alias,
        None => tr.next_alias("union"),
    };
    Ok(SqlExpr::Union(Union {
        sources,
        alias,
        distinct,
    }))
}

fn union_side(tr: &mut Translator, call: &OperatorCall, side: SqlExpr) -> Result<Select> {
    match side {
        SqlExpr::Table(_) | SqlExpr::Union(_) => {
            let (select, _) = tr.normalize(side)?;
            Ok(select)
        }
        SqlExpr::Select(select) => {
            let mut select = *select;
            if select.is_paged() {
                let (outer, _) = tr.wrap_as_derived(select);
                return Ok(outer);
            }
            // A union member cannot carry its own ORDER BY.
            select.orderings.clear();
            Ok(select)
        }
        other => bail!(TranslationError::StructuralPrecondition(format!(
            "`{}` side is a {}, not a table, select or union",
            call.operator.method(),
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::query_ir::QueryExpr;
    use crate::sql_ir::{SqlExpr, SqlSource};
    use crate::translator::Translator;

    fn union_of(query: &QueryExpr) -> crate::sql_ir::Union {
        match Translator::new().translate(query).unwrap() {
            SqlExpr::Select(select) => match select.from {
                Some(SqlSource::Union(union)) => union,
                other => panic!("expected union source, got {:?}", other),
            },
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_same_kind_unions_flatten() {
        let query = QueryExpr::call(
            QueryExpr::call(
                QueryExpr::call(QueryExpr::table("A"), "concat", vec![QueryExpr::table("B")]),
                "concat",
                vec![QueryExpr::table("C")],
            ),
            "concat",
            vec![QueryExpr::table("D")],
        );
        let union = union_of(&query);
        assert_eq!(union.sources.len(), 4);
        assert!(!union.distinct);
    }

    #[test]
    fn test_mixed_kinds_nest() {
        let query = QueryExpr::call(
            QueryExpr::call(QueryExpr::table("A"), "union", vec![QueryExpr::table("B")]),
            "concat",
            vec![QueryExpr::table("C")],
        );
        let union = union_of(&query);
        assert_eq!(union.sources.len(), 2);
        assert!(matches!(
            union.sources[0].from,
            Some(SqlSource::Union(ref inner)) if inner.distinct && inner.sources.len() == 2
        ));
    }

    #[test]
    fn test_paged_side_is_wrapped() {
        let paged = QueryExpr::call(QueryExpr::table("B"), "take", vec![QueryExpr::literal(3)]);
        let query = QueryExpr::call(QueryExpr::table("A"), "union", vec![paged]);
        let union = union_of(&query);
        assert!(!union.sources[1].is_paged());
        assert!(matches!(union.sources[1].from, Some(SqlSource::Select(_))));
    }
}
