// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-operator translators.
//!
//! Each translator consumes the select built so far together with the data
//! source its lambdas resolve against, and returns a new node.

pub mod aggregate;
pub mod exists;
pub mod filter;
pub mod group_by;
pub mod join;
pub mod ordering;
pub mod paging;
pub mod projection;
pub mod set_ops;
pub mod terminal;

use anyhow::{bail, Result};

use crate::query_ir::{Lambda, QueryExpr};
use crate::sql_ir::{JoinKind, SortDirection, SqlExpr};

use super::context::TranslationContext;
use super::errors::TranslationError;
use super::Translator;
use aggregate::AggregateFunction;

/// Query operators with a translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Where,
    Select,
    Join,
    LeftJoin,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Skip,
    Take,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    GroupBy,
    Union,
    Concat,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    ToArray,
    ToList,
    Any,
    All,
}

impl QueryOperator {
    pub fn from_method(name: &str) -> Option<Self> {
        Some(match name {
            "where" => QueryOperator::Where,
            "select" => QueryOperator::Select,
            "join" => QueryOperator::Join,
            "leftJoin" => QueryOperator::LeftJoin,
            "orderBy" => QueryOperator::OrderBy,
            "orderByDescending" => QueryOperator::OrderByDescending,
            "thenBy" => QueryOperator::ThenBy,
            "thenByDescending" => QueryOperator::ThenByDescending,
            "skip" => QueryOperator::Skip,
            "take" => QueryOperator::Take,
            "count" => QueryOperator::Count,
            "sum" => QueryOperator::Sum,
            "avg" => QueryOperator::Avg,
            "min" => QueryOperator::Min,
            "max" => QueryOperator::Max,
            "groupBy" => QueryOperator::GroupBy,
            "union" => QueryOperator::Union,
            "concat" => QueryOperator::Concat,
            "first" => QueryOperator::First,
            "firstOrDefault" => QueryOperator::FirstOrDefault,
            "single" => QueryOperator::Single,
            "singleOrDefault" => QueryOperator::SingleOrDefault,
            "toArray" => QueryOperator::ToArray,
            "toList" => QueryOperator::ToList,
            "any" => QueryOperator::Any,
            "all" => QueryOperator::All,
            _ => return None,
        })
    }

    pub fn method(self) -> &'static str {
        match self {
            QueryOperator::Where => "where",
            QueryOperator::Select => "select",
            QueryOperator::Join => "join",
            QueryOperator::LeftJoin => "leftJoin",
            QueryOperator::OrderBy => "orderBy",
            QueryOperator::OrderByDescending => "orderByDescending",
            QueryOperator::ThenBy => "thenBy",
            QueryOperator::ThenByDescending => "thenByDescending",
            QueryOperator::Skip => "skip",
            QueryOperator::Take => "take",
            QueryOperator::Count => "count",
            QueryOperator::Sum => "sum",
            QueryOperator::Avg => "avg",
            QueryOperator::Min => "min",
            QueryOperator::Max => "max",
            QueryOperator::GroupBy => "groupBy",
            QueryOperator::Union => "union",
            QueryOperator::Concat => "concat",
            QueryOperator::First => "first",
            QueryOperator::FirstOrDefault => "firstOrDefault",
            QueryOperator::Single => "single",
            QueryOperator::SingleOrDefault => "singleOrDefault",
            QueryOperator::ToArray => "toArray",
            QueryOperator::ToList => "toList",
            QueryOperator::Any => "any",
            QueryOperator::All => "all",
        }
    }
}

/// An operator application with its receiver and raw arguments.
#[derive(Debug, Clone, Copy)]
pub struct OperatorCall<'q> {
    pub operator: QueryOperator,
    pub receiver: &'q QueryExpr,
    pub args: &'q [QueryExpr],
}

impl<'q> OperatorCall<'q> {
    pub fn arg(&self, index: usize) -> Result<&'q QueryExpr> {
        match self.args.get(index) {
            Some(arg) => Ok(arg),
            None => bail!(TranslationError::Arity(format!(
                "`{}` is missing argument {}",
                self.operator.method(),
                index + 1
            ))),
        }
    }

    pub fn lambda(&self, index: usize) -> Result<&'q Lambda> {
        match self.optional_lambda(index)? {
            Some(lambda) => Ok(lambda),
            None => bail!(TranslationError::Arity(format!(
                "`{}` requires a lambda as argument {}",
                self.operator.method(),
                index + 1
            ))),
        }
    }

    /// The lambda at `index`, if that argument was given.
    pub fn optional_lambda(&self, index: usize) -> Result<Option<&'q Lambda>> {
        match self.args.get(index) {
            None => Ok(None),
            Some(QueryExpr::Lambda(lambda)) => Ok(Some(lambda)),
            Some(other) => bail!(TranslationError::Arity(format!(
                "`{}` expects a lambda as argument {}, got `{}`",
                self.operator.method(),
                index + 1,
                other
            ))),
        }
    }
}

/// Visit the receiver and run the operator's translator.
pub(crate) fn dispatch(
    tr: &mut Translator,
    call: OperatorCall,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    let receiver = tr.visit(call.receiver, ctx)?;
    if matches!(call.operator, QueryOperator::Union | QueryOperator::Concat) {
        return set_ops::translate_union(tr, &call, receiver, ctx);
    }

    let (select, source) = tr.normalize(receiver)?;
    let select = match call.operator {
        QueryOperator::Where => filter::translate_where(tr, &call, select, source, ctx)?,
        QueryOperator::Select => projection::translate_select(tr, &call, select, source, ctx)?,
        QueryOperator::Join => {
            join::translate_join(tr, &call, JoinKind::Inner, select, source, ctx)?
        }
        QueryOperator::LeftJoin => {
            join::translate_join(tr, &call, JoinKind::Left, select, source, ctx)?
        }
        QueryOperator::OrderBy => ordering::translate_order_by(
            tr,
            &call,
            SortDirection::Ascending,
            select,
            source,
            ctx,
        )?,
        QueryOperator::OrderByDescending => ordering::translate_order_by(
            tr,
            &call,
            SortDirection::Descending,
            select,
            source,
            ctx,
        )?,
        QueryOperator::ThenBy => ordering::translate_then_by(
            tr,
            &call,
            SortDirection::Ascending,
            select,
            source,
            ctx,
        )?,
        QueryOperator::ThenByDescending => ordering::translate_then_by(
            tr,
            &call,
            SortDirection::Descending,
            select,
            source,
            ctx,
        )?,
        QueryOperator::Skip => paging::translate_skip(&call, select, ctx)?,
        QueryOperator::Take => paging::translate_take(&call, select, ctx)?,
        QueryOperator::Count => aggregate::translate_aggregate(
            tr,
            &call,
            AggregateFunction::Count,
            select,
            source,
            ctx,
        )?,
        QueryOperator::Sum => {
            aggregate::translate_aggregate(tr, &call, AggregateFunction::Sum, select, source, ctx)?
        }
        QueryOperator::Avg => {
            aggregate::translate_aggregate(tr, &call, AggregateFunction::Avg, select, source, ctx)?
        }
        QueryOperator::Min => {
            aggregate::translate_aggregate(tr, &call, AggregateFunction::Min, select, source, ctx)?
        }
        QueryOperator::Max => {
            aggregate::translate_aggregate(tr, &call, AggregateFunction::Max, select, source, ctx)?
        }
        QueryOperator::GroupBy => group_by::translate_group_by(tr, &call, select, source, ctx)?,
        QueryOperator::First
        | QueryOperator::FirstOrDefault
        | QueryOperator::Single
        | QueryOperator::SingleOrDefault => {
            terminal::translate_first_or_single(tr, &call, select, source, ctx)?
        }
        QueryOperator::ToArray | QueryOperator::ToList => select,
        QueryOperator::Any => return exists::translate_any(tr, &call, select, source, ctx),
        QueryOperator::All => return exists::translate_all(tr, &call, select, source, ctx),
        QueryOperator::Union | QueryOperator::Concat => {
            bail!(TranslationError::Internal(
                "set operator reached select dispatch".to_string()
            ))
        }
    };
    Ok(SqlExpr::Select(Box::new(select)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for operator in [
            QueryOperator::Where,
            QueryOperator::LeftJoin,
            QueryOperator::ThenByDescending,
            QueryOperator::SingleOrDefault,
            QueryOperator::All,
        ] {
            assert_eq!(QueryOperator::from_method(operator.method()), Some(operator));
        }
        assert_eq!(QueryOperator::from_method("distinct"), None);
        assert_eq!(QueryOperator::from_method("Where"), None);
    }

    #[test]
    fn test_lambda_arguments_checked() {
        let receiver = QueryExpr::table("Users");
        let args = [QueryExpr::literal(3)];
        let call = OperatorCall {
            operator: QueryOperator::Where,
            receiver: &receiver,
            args: &args,
        };
        let err = call.lambda(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranslationError>(),
            Some(TranslationError::Arity(_))
        ));
        assert!(call.optional_lambda(1).unwrap().is_none());
        assert!(call.arg(1).is_err());
    }
}
