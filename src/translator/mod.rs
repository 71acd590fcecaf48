// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Query-Expression to SQL-Expression Translator
//!
//! The orchestrator walks a [`QueryExpr`] tree depth-first. Operator calls
//! visit their receiver first, then hand the resulting select to the matching
//! translator in [`operators`], which re-enters [`Translator::visit_in_context`]
//! to lower lambda bodies against the right data source.

pub mod alias;
pub mod context;
pub mod errors;
mod methods;
pub mod operators;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, trace};

use crate::config::TranslatorConfig;
use crate::query_ir::{BinaryOp, Lambda, Param, QueryExpr, UnaryOp};
use crate::sql_ir::{Projection, Select, SqlBinaryOp, SqlExpr, SqlSource, Table, WhenClause};
use crate::value::Value;

pub use alias::AliasGenerator;
pub use context::{DataSource, KeyPart, TranslationContext};
pub use errors::TranslationError;
pub use operators::QueryOperator;

/// Lowers query expressions into SQL expressions.
///
/// Aliases are handed out per [`Translator::translate`] call, so one
/// translator can be reused for many independent queries.
#[derive(Debug, Default)]
pub struct Translator {
    config: TranslatorConfig,
    aliases: AliasGenerator,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TranslatorConfig) -> Self {
        Self {
            config,
            aliases: AliasGenerator::new(),
        }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate a full query. The result is a `Select`, an `Exists` or the
    /// negated `Exists` produced by `all`.
    pub fn translate(&mut self, expr: &QueryExpr) -> Result<SqlExpr> {
        self.aliases = AliasGenerator::new();
        debug!("translating {}", expr);

        let ctx = TranslationContext::new();
        let result = self.visit(expr, &ctx)?;
        if let SqlExpr::Select(select) = &result {
            trace!("lowered to {}", select.to_json());
        }
        match result {
            SqlExpr::Table(_) | SqlExpr::Union(_) => {
                let (select, _) = self.normalize(result)?;
                Ok(SqlExpr::Select(Box::new(select)))
            }
            SqlExpr::Select(_) | SqlExpr::Exists(_) => Ok(result),
            SqlExpr::Not(inner) if matches!(inner.as_ref(), SqlExpr::Exists(_)) => {
                Ok(SqlExpr::Not(inner))
            }
            other => bail!(TranslationError::Internal(format!(
                "query produced a {} instead of a SELECT or EXISTS",
                other.kind()
            ))),
        }
    }

    pub(crate) fn next_alias(&mut self, seed: &str) -> String {
        self.aliases.alias(seed)
    }

    /// Lower one node in the given context.
    pub(crate) fn visit(&mut self, expr: &QueryExpr, ctx: &TranslationContext) -> Result<SqlExpr> {
        match expr {
            QueryExpr::Constant(Value::Table(name)) | QueryExpr::Literal(Value::Table(name)) => {
                let alias = self.next_alias(name);
                trace!("table {} bound as [{}]", name, alias);
                Ok(SqlExpr::Table(Table {
                    name: name.clone(),
                    alias,
                }))
            }
            QueryExpr::Constant(Value::Array(_)) | QueryExpr::Literal(Value::Array(_)) => {
                bail!(TranslationError::InvalidLiteral(
                    "array values can only be the receiver of includes/contains".to_string()
                ))
            }
            QueryExpr::Constant(value) | QueryExpr::Literal(value) => {
                Ok(SqlExpr::Constant(value.clone()))
            }
            QueryExpr::Parameter(param) => self.visit_parameter(param, ctx),
            QueryExpr::Member { object, name } => self.visit_member(object, name, ctx),
            QueryExpr::Binary { left, op, right } => self.visit_binary(left, *op, right, ctx),
            QueryExpr::Unary { op, operand } => {
                let operand = self.visit(operand, ctx)?;
                Ok(match op {
                    UnaryOp::Not => SqlExpr::Not(Box::new(self.as_condition(operand)?)),
                    UnaryOp::Negate => SqlExpr::Negate(Box::new(self.as_scalar(operand)?)),
                })
            }
            QueryExpr::Call {
                source,
                method,
                args,
            } => self.visit_call(source, method, args, ctx),
            QueryExpr::Lambda(_) => bail!(TranslationError::Unsupported(
                "lambda outside an operator argument".to_string()
            )),
            QueryExpr::NewObject(_) => bail!(TranslationError::Unsupported(
                "object literal outside a projection".to_string()
            )),
            QueryExpr::Scope { source, bindings } => {
                let scoped = ctx.with_externals(bindings);
                self.visit(source, &scoped)
            }
            QueryExpr::Conditional {
                test,
                if_true,
                if_false,
            } => self.visit_conditional(test, if_true, if_false, ctx),
        }
    }

    /// Bind the lambda's parameters to `sources` and lower its body.
    pub(crate) fn visit_in_context(
        &mut self,
        lambda: &Lambda,
        sources: Vec<DataSource>,
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        let child = ctx.create_child(&lambda.params, sources)?;
        self.visit(&lambda.body, &child)
    }

    fn visit_parameter(&mut self, param: &Param, ctx: &TranslationContext) -> Result<SqlExpr> {
        if let Some(source) = ctx.resolve(param) {
            return match source {
                DataSource::Table(table) => Ok(SqlExpr::Table(table.clone())),
                DataSource::Union(union) => Ok(SqlExpr::Union(union.clone())),
                DataSource::GroupKey(parts) => match parts.as_slice() {
                    [single] if single.name.is_none() => Ok(single.expression.clone()),
                    _ => bail!(TranslationError::Unsupported(format!(
                        "composite group key `{}` used as a single value",
                        param.name
                    ))),
                },
                DataSource::Group(_) => bail!(TranslationError::Unsupported(format!(
                    "group `{}` can only be aggregated",
                    param.name
                ))),
                DataSource::Select(_) | DataSource::Subquery(_) => {
                    bail!(TranslationError::Unsupported(format!(
                        "row `{}` used as a value",
                        param.name
                    )))
                }
            };
        }

        if let Some(bound) = ctx.resolve_external(&param.name) {
            trace!("free variable `{}` resolved through scope", param.name);
            return self.visit(bound, ctx);
        }

        bail!(TranslationError::UnresolvedParameter(param.name.clone()))
    }

    fn visit_member(
        &mut self,
        object: &QueryExpr,
        name: &str,
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        if let Some((param, path)) = member_path(object, name) {
            if let Some(source) = ctx.resolve(param) {
                return self.resolve_path(source, param, &path);
            }
        }

        match self.visit(object, ctx)? {
            // `query.first().title`: narrow the nested select to one column.
            SqlExpr::Select(select) => {
                let column = DataSource::Select(select.clone())
                    .lookup(name)
                    .ok_or_else(|| {
                        anyhow!(TranslationError::UnresolvedMember(format!(
                            "`{}` is not projected by the nested query",
                            name
                        )))
                    })?;
                let projection = Projection::new(column, None);
                Ok(SqlExpr::Select(Box::new(
                    select.with_projections(vec![projection]),
                )))
            }
            target => scalar_member(target, name),
        }
    }

    fn resolve_path(&self, source: &DataSource, param: &Param, path: &[&str]) -> Result<SqlExpr> {
        for split in (1..=path.len()).rev() {
            if let Some(mut expr) = source.lookup(&path[..split].join(".")) {
                for name in &path[split..] {
                    expr = scalar_member(expr, name)?;
                }
                return Ok(expr);
            }
        }

        if let DataSource::GroupKey(parts) = source {
            if let [single] = parts.as_slice() {
                if single.name.is_none() {
                    let mut expr = single.expression.clone();
                    for name in path {
                        expr = scalar_member(expr, name)?;
                    }
                    return Ok(expr);
                }
            }
        }

        bail!(TranslationError::UnresolvedMember(format!(
            "`{}.{}` is not available on {} `{}`",
            param.name,
            path.join("."),
            source.kind(),
            param.name
        )))
    }

    fn visit_binary(
        &mut self,
        left: &QueryExpr,
        op: BinaryOp,
        right: &QueryExpr,
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        let l = self.visit_operand(left, right, op, ctx)?;
        let r = self.visit_operand(right, left, op, ctx)?;

        if op == BinaryOp::Coalesce {
            return Ok(SqlExpr::function(
                "COALESCE",
                vec![self.as_scalar(l)?, self.as_scalar(r)?],
            ));
        }

        let sql_op = SqlBinaryOp::try_from(op).map_err(|op| {
            anyhow!(TranslationError::Internal(format!(
                "no SQL operator for `{}`",
                op.symbol()
            )))
        })?;

        if sql_op.is_logical() {
            return Ok(SqlExpr::binary(
                self.as_condition(l)?,
                sql_op,
                self.as_condition(r)?,
            ));
        }

        let (l, r) = (self.as_scalar(l)?, self.as_scalar(r)?);
        if sql_op.is_comparison()
            && matches!(l, SqlExpr::Constant(_))
            && matches!(r, SqlExpr::Column(_))
        {
            return Ok(SqlExpr::binary(r, sql_op.flipped(), l));
        }
        Ok(SqlExpr::binary(l, sql_op, r))
    }

    /// Visit one side of a binary operation. A whole row compared with null
    /// becomes its primary-key column.
    fn visit_operand(
        &mut self,
        expr: &QueryExpr,
        other: &QueryExpr,
        op: BinaryOp,
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        let null_check = matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) && is_null_value(other);
        if null_check {
            if let QueryExpr::Parameter(param) = expr {
                if let Some(source) = ctx.resolve(param) {
                    let key = &self.config.primary_key;
                    return source.lookup(key).ok_or_else(|| {
                        anyhow!(TranslationError::UnresolvedMember(format!(
                            "primary key `{}` is not available on {} `{}`",
                            key,
                            source.kind(),
                            param.name
                        )))
                    });
                }
            }
        }

        match self.visit(expr, ctx)? {
            SqlExpr::Table(table) if null_check => {
                Ok(SqlExpr::column(&table.alias, &self.config.primary_key))
            }
            value => Ok(value),
        }
    }

    fn visit_conditional(
        &mut self,
        test: &QueryExpr,
        if_true: &QueryExpr,
        if_false: &QueryExpr,
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        let test = self.visit(test, ctx)?;
        let when = self.as_condition(test)?;
        let then = self.visit(if_true, ctx)?;
        let then = self.as_scalar(then)?;
        let otherwise = self.visit(if_false, ctx)?;

        let mut when_clauses = vec![WhenClause { when, then }];
        // `a ? x : b ? y : z` folds into one CASE.
        let else_result = match self.as_scalar(otherwise)? {
            SqlExpr::Case {
                when_clauses: nested,
                else_result,
            } => {
                when_clauses.extend(nested);
                else_result
            }
            other => Some(Box::new(other)),
        };
        Ok(SqlExpr::Case {
            when_clauses,
            else_result,
        })
    }

    fn visit_call(
        &mut self,
        source: &QueryExpr,
        method: &str,
        args: &[QueryExpr],
        ctx: &TranslationContext,
    ) -> Result<SqlExpr> {
        if let Some(expr) = methods::translate_instance_call(self, source, method, args, ctx)? {
            return Ok(expr);
        }
        if let Some(expr) =
            operators::group_by::translate_group_aggregate(self, source, method, args, ctx)?
        {
            return Ok(expr);
        }

        let operator = QueryOperator::from_method(method).ok_or_else(|| {
            anyhow!(TranslationError::Unsupported(format!("method `{}`", method)))
        })?;
        trace!("dispatching `{}`", method);
        operators::dispatch(
            self,
            operators::OperatorCall {
                operator,
                receiver: source,
                args,
            },
            ctx,
        )
    }

    /// Turn the visited receiver of an operator into the select to extend and
    /// the source its lambdas resolve against.
    pub(crate) fn normalize(&mut self, receiver: SqlExpr) -> Result<(Select, DataSource)> {
        match receiver {
            SqlExpr::Table(table) => {
                let alias = self.next_alias("select");
                let source = DataSource::Table(table.clone());
                Ok((Select::from_source(alias, SqlSource::Table(table)), source))
            }
            SqlExpr::Union(union) => {
                let alias = self.next_alias("select");
                let source = DataSource::Union(union.clone());
                Ok((Select::from_source(alias, SqlSource::Union(union)), source))
            }
            SqlExpr::Select(select) => {
                let source = DataSource::Select(select.clone());
                Ok((*select, source))
            }
            other => bail!(TranslationError::StructuralPrecondition(format!(
                "operator receiver is a {}, not a table, select or union",
                other.kind()
            ))),
        }
    }

    /// `SELECT [s].* FROM (select) AS [s]`, with lambdas resolving against the
    /// derived table's columns.
    pub(crate) fn wrap_as_derived(&mut self, mut select: Select) -> (Select, DataSource) {
        if !select.is_paged() {
            // ORDER BY is not allowed in a derived table without OFFSET.
            select.orderings.clear();
        }
        debug!("wrapping select `{}` as a derived table", select.alias);
        let alias = self.next_alias("select");
        let source = DataSource::Subquery(Box::new(select.clone()));
        (
            Select::from_source(alias, SqlSource::Select(Box::new(select))),
            source,
        )
    }

    /// Wrap when `needs_wrap`, otherwise pass the select through unchanged.
    pub(crate) fn wrap_if(
        &mut self,
        needs_wrap: bool,
        select: Select,
        source: DataSource,
    ) -> (Select, DataSource) {
        if needs_wrap {
            self.wrap_as_derived(select)
        } else {
            (select, source)
        }
    }

    /// Coerce a lowered expression into a search condition.
    pub(crate) fn as_condition(&self, expr: SqlExpr) -> Result<SqlExpr> {
        if expr.is_predicate() {
            return Ok(expr);
        }
        let value = self.as_scalar(expr)?;
        Ok(SqlExpr::equals(value, SqlExpr::constant(1)))
    }

    /// Coerce a lowered expression into a scalar operand.
    pub(crate) fn as_scalar(&self, expr: SqlExpr) -> Result<SqlExpr> {
        match expr {
            SqlExpr::Select(select) => {
                if select.projections.len() != 1 {
                    bail!(TranslationError::StructuralPrecondition(format!(
                        "nested query `{}` used as a value must project exactly one column",
                        select.alias
                    )));
                }
                Ok(SqlExpr::ScalarSubquery(select))
            }
            SqlExpr::Table(table) => bail!(TranslationError::Unsupported(format!(
                "table `{}` used as a value",
                table.name
            ))),
            SqlExpr::Union(_) => bail!(TranslationError::Unsupported(
                "union used as a value".to_string()
            )),
            predicate if predicate.is_predicate() => Ok(flag(predicate)),
            value => Ok(value),
        }
    }
}

/// `CASE WHEN p THEN 1 ELSE 0 END`
pub(crate) fn flag(predicate: SqlExpr) -> SqlExpr {
    SqlExpr::Case {
        when_clauses: vec![WhenClause {
            when: predicate,
            then: SqlExpr::constant(1),
        }],
        else_result: Some(Box::new(SqlExpr::constant(0))),
    }
}

/// `u.address.city` as (`u`, ["address", "city"]).
fn member_path<'q>(object: &'q QueryExpr, name: &'q str) -> Option<(&'q Param, Vec<&'q str>)> {
    let mut path = vec![name];
    let mut current = object;
    loop {
        match current {
            QueryExpr::Member { object, name } => {
                path.push(name);
                current = object;
            }
            QueryExpr::Parameter(param) => {
                path.reverse();
                return Some((param, path));
            }
            _ => return None,
        }
    }
}

/// Known properties of scalar values.
fn scalar_member(target: SqlExpr, name: &str) -> Result<SqlExpr> {
    if target.is_source() {
        bail!(TranslationError::UnresolvedMember(format!(
            "`{}` on a {}",
            name,
            target.kind()
        )));
    }
    if name == "length" {
        return Ok(SqlExpr::function("LEN", vec![target]));
    }
    if let Some(part) = methods::date_part(name) {
        return Ok(methods::datepart(part, target));
    }
    bail!(TranslationError::UnresolvedMember(format!(
        "`{}` has no SQL mapping",
        name
    )))
}

fn is_null_value(expr: &QueryExpr) -> bool {
    matches!(
        expr,
        QueryExpr::Constant(Value::Null) | QueryExpr::Literal(Value::Null)
    )
}

/// Evaluate an expression that does not depend on any row.
pub(crate) fn static_eval(expr: &QueryExpr, ctx: &TranslationContext) -> Option<Value> {
    match expr {
        QueryExpr::Constant(value) | QueryExpr::Literal(value) => match value {
            Value::Table(_) => None,
            _ => Some(value.clone()),
        },
        QueryExpr::Parameter(param) if ctx.resolve(param).is_none() => {
            static_eval(ctx.resolve_external(&param.name)?, ctx)
        }
        QueryExpr::Unary {
            op: UnaryOp::Negate,
            operand,
        } => match static_eval(operand, ctx)? {
            Value::Int(i) => i.checked_neg().map(Value::Int),
            Value::Float(f) => Some(Value::Float(-f)),
            _ => None,
        },
        QueryExpr::Binary { left, op, right } => {
            let (l, r) = (static_eval(left, ctx)?, static_eval(right, ctx)?);
            match (l, r) {
                (Value::Int(a), Value::Int(b)) => match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Subtract => a.checked_sub(b),
                    BinaryOp::Multiply => a.checked_mul(b),
                    BinaryOp::Divide => a.checked_div(b),
                    BinaryOp::Modulo => a.checked_rem(b),
                    _ => None,
                }
                .map(Value::Int),
                (Value::Float(a), Value::Float(b)) => float_arith(a, *op, b),
                (Value::Int(a), Value::Float(b)) => float_arith(a as f64, *op, b),
                (Value::Float(a), Value::Int(b)) => float_arith(a, *op, b as f64),
                _ => None,
            }
        }
        _ => None,
    }
}

fn float_arith(a: f64, op: BinaryOp, b: f64) -> Option<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        _ => return None,
    };
    result.is_finite().then_some(Value::Float(result))
}
