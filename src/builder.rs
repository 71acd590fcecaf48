// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fluent construction of query expressions
//!
//! Builds [`QueryExpr`] trees directly, without parsing host-language source.
//! Every builder call produces exactly one IR node.
//!
//! ```ignore
//! let query = Query::table("Users")
//!     .filter(lambda("u", |u| u.get("age").gt(30)))
//!     .select(lambda("u", |u| u.get("name")));
//! ```

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};
use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::query_ir::{BinaryOp, Param, QueryExpr, UnaryOp};
use crate::value::Value;

/// A scalar expression inside a lambda body.
#[derive(Debug, Clone)]
pub struct Expr(QueryExpr);

impl Expr {
    pub fn into_inner(self) -> QueryExpr {
        self.0
    }

    /// Member access: `self.name`.
    pub fn get(self, name: &str) -> Expr {
        Expr(QueryExpr::member(self.0, name))
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Expr {
        Expr(QueryExpr::binary(self.0, op, other.into().0))
    }

    pub fn equals(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Equal, other)
    }

    pub fn not_equals(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::NotEqual, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LessThan, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LessThanOrEqual, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::GreaterThan, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::GreaterThanOrEqual, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, other)
    }

    /// `self ?? fallback`
    pub fn coalesce(self, fallback: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Coalesce, fallback)
    }

    /// Instance method call on a scalar or on a nested query.
    pub fn method(self, method: &str, args: Vec<Expr>) -> Expr {
        Expr(QueryExpr::call(
            self.0,
            method,
            args.into_iter().map(Expr::into_inner).collect(),
        ))
    }

    pub fn starts_with(self, prefix: impl Into<Expr>) -> Expr {
        self.method("startsWith", vec![prefix.into()])
    }

    pub fn ends_with(self, suffix: impl Into<Expr>) -> Expr {
        self.method("endsWith", vec![suffix.into()])
    }

    /// Substring test on a string, or membership test when `self` is an array.
    pub fn includes(self, item: impl Into<Expr>) -> Expr {
        self.method("includes", vec![item.into()])
    }

    pub fn to_upper_case(self) -> Expr {
        self.method("toUpperCase", vec![])
    }

    pub fn to_lower_case(self) -> Expr {
        self.method("toLowerCase", vec![])
    }

    pub fn trim(self) -> Expr {
        self.method("trim", vec![])
    }

    pub fn substring(self, start: impl Into<Expr>, length: Option<Expr>) -> Expr {
        let mut args = vec![start.into()];
        args.extend(length);
        self.method("substring", args)
    }

    /// Aggregate or operator call on a group placeholder, e.g. `g.count()`.
    pub fn aggregate(self, method: &str, selector: Option<QueryExpr>) -> Expr {
        Expr(QueryExpr::call(self.0, method, selector.into_iter().collect()))
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expr>> $trait<T> for Expr {
            type Output = Expr;

            fn $method(self, other: T) -> Expr {
                self.binary($op, other)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Subtract);
impl_binary_operator!(Mul, mul, BinaryOp::Multiply);
impl_binary_operator!(Div, div, BinaryOp::Divide);
impl_binary_operator!(Rem, rem, BinaryOp::Modulo);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr(QueryExpr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self.0),
        })
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr(QueryExpr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self.0),
        })
    }
}

impl From<QueryExpr> for Expr {
    fn from(expr: QueryExpr) -> Self {
        Expr(expr)
    }
}

impl From<Query> for Expr {
    fn from(query: Query) -> Self {
        Expr(query.expr)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr(QueryExpr::Literal(value))
    }
}

macro_rules! impl_literal {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(value: $t) -> Self {
                    Expr(QueryExpr::literal(value))
                }
            }
        )*
    };
}

impl_literal!(bool, i32, i64, f64, &str, String, NaiveDateTime);

/// Literal `null`.
pub fn null() -> Expr {
    Expr(QueryExpr::Literal(Value::Null))
}

/// A value captured from the calling scope, such as an array for `includes`.
pub fn constant(value: impl Into<Value>) -> Expr {
    Expr(QueryExpr::constant(value))
}

/// A free variable, resolved by name against the nearest `provide_scope`.
pub fn var(name: &str) -> Expr {
    Expr(QueryExpr::Parameter(Param::new(name)))
}

/// Object literal; properties keep their order.
pub fn object(properties: Vec<(&str, Expr)>) -> Expr {
    Expr(QueryExpr::NewObject(
        properties
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.0))
            .collect(),
    ))
}

/// `test ? if_true : if_false`
pub fn cond(test: impl Into<Expr>, if_true: impl Into<Expr>, if_false: impl Into<Expr>) -> Expr {
    Expr(QueryExpr::Conditional {
        test: Box::new(test.into().0),
        if_true: Box::new(if_true.into().0),
        if_false: Box::new(if_false.into().0),
    })
}

/// One-parameter lambda. The closure receives the parameter as an [`Expr`].
pub fn lambda(name: &str, body: impl FnOnce(Expr) -> Expr) -> QueryExpr {
    let param = Param::new(name);
    let body = body(Expr(QueryExpr::param(&param)));
    QueryExpr::lambda(vec![param], body.0)
}

/// Two-parameter lambda, used by join and group result selectors.
pub fn lambda2(first: &str, second: &str, body: impl FnOnce(Expr, Expr) -> Expr) -> QueryExpr {
    let a = Param::new(first);
    let b = Param::new(second);
    let body = body(Expr(QueryExpr::param(&a)), Expr(QueryExpr::param(&b)));
    QueryExpr::lambda(vec![a, b], body.0)
}

/// An operator chain rooted at a table.
#[derive(Debug, Clone)]
pub struct Query {
    expr: QueryExpr,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            expr: QueryExpr::table(name),
        }
    }

    pub fn from_expr(expr: QueryExpr) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &QueryExpr {
        &self.expr
    }

    pub fn into_expr(self) -> QueryExpr {
        self.expr
    }

    /// Apply any operator by name.
    pub fn call(self, method: &str, args: Vec<QueryExpr>) -> Self {
        Self {
            expr: QueryExpr::call(self.expr, method, args),
        }
    }

    /// `where(predicate)`
    pub fn filter(self, predicate: QueryExpr) -> Self {
        self.call("where", vec![predicate])
    }

    pub fn select(self, selector: QueryExpr) -> Self {
        self.call("select", vec![selector])
    }

    pub fn join(
        self,
        inner: Query,
        outer_key: QueryExpr,
        inner_key: QueryExpr,
        result: QueryExpr,
    ) -> Self {
        self.call("join", vec![inner.expr, outer_key, inner_key, result])
    }

    pub fn left_join(
        self,
        inner: Query,
        outer_key: QueryExpr,
        inner_key: QueryExpr,
        result: QueryExpr,
    ) -> Self {
        self.call("leftJoin", vec![inner.expr, outer_key, inner_key, result])
    }

    pub fn order_by(self, key: QueryExpr) -> Self {
        self.call("orderBy", vec![key])
    }

    pub fn order_by_descending(self, key: QueryExpr) -> Self {
        self.call("orderByDescending", vec![key])
    }

    pub fn then_by(self, key: QueryExpr) -> Self {
        self.call("thenBy", vec![key])
    }

    pub fn then_by_descending(self, key: QueryExpr) -> Self {
        self.call("thenByDescending", vec![key])
    }

    pub fn skip(self, count: impl Into<Expr>) -> Self {
        self.call("skip", vec![count.into().0])
    }

    pub fn take(self, count: impl Into<Expr>) -> Self {
        self.call("take", vec![count.into().0])
    }

    pub fn group_by(self, key: QueryExpr) -> Self {
        self.call("groupBy", vec![key])
    }

    /// `groupBy(key, (key, group) => result)`
    pub fn group_by_with(self, key: QueryExpr, result: QueryExpr) -> Self {
        self.call("groupBy", vec![key, result])
    }

    pub fn union(self, other: Query) -> Self {
        self.call("union", vec![other.expr])
    }

    pub fn concat(self, other: Query) -> Self {
        self.call("concat", vec![other.expr])
    }

    pub fn count(self) -> Self {
        self.call("count", vec![])
    }

    pub fn count_where(self, predicate: QueryExpr) -> Self {
        self.call("count", vec![predicate])
    }

    pub fn sum(self, selector: QueryExpr) -> Self {
        self.call("sum", vec![selector])
    }

    pub fn avg(self, selector: QueryExpr) -> Self {
        self.call("avg", vec![selector])
    }

    pub fn min(self, selector: QueryExpr) -> Self {
        self.call("min", vec![selector])
    }

    pub fn max(self, selector: QueryExpr) -> Self {
        self.call("max", vec![selector])
    }

    pub fn first(self) -> Self {
        self.call("first", vec![])
    }

    pub fn first_where(self, predicate: QueryExpr) -> Self {
        self.call("first", vec![predicate])
    }

    pub fn first_or_default(self) -> Self {
        self.call("firstOrDefault", vec![])
    }

    pub fn single(self) -> Self {
        self.call("single", vec![])
    }

    pub fn single_or_default(self) -> Self {
        self.call("singleOrDefault", vec![])
    }

    pub fn to_array(self) -> Self {
        self.call("toArray", vec![])
    }

    pub fn to_list(self) -> Self {
        self.call("toList", vec![])
    }

    pub fn any(self) -> Self {
        self.call("any", vec![])
    }

    pub fn any_where(self, predicate: QueryExpr) -> Self {
        self.call("any", vec![predicate])
    }

    pub fn all(self, predicate: QueryExpr) -> Self {
        self.call("all", vec![predicate])
    }

    /// Make named values and sub-queries visible to every lambda in the chain.
    pub fn provide_scope(self, bindings: Vec<(&str, Expr)>) -> Self {
        let bindings: BTreeMap<String, QueryExpr> = bindings
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.0))
            .collect();
        Self {
            expr: QueryExpr::Scope {
                source: Box::new(self.expr),
                bindings,
            },
        }
    }
}

impl From<Query> for QueryExpr {
    fn from(query: Query) -> Self {
        query.expr
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}
