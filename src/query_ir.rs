// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Query-Expression Intermediate Representation
//!
//! The tree a front end hands to the translator: operator chains over named
//! tables, with every predicate and selector already resolved into a [`Lambda`].
//! Nodes are immutable once built; the translator only ever reads them.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

static NEXT_PARAM_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a lambda parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u32);

/// A placeholder bound by an enclosing lambda.
///
/// Two parameters are the same parameter only if their ids match; the name is
/// kept for error messages and for resolving free variables against `Scope`
/// bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub id: ParamId,
    pub name: String,
}

impl Param {
    /// Creates a parameter with a fresh, process-unique identity.
    pub fn new(name: &str) -> Self {
        Self {
            id: ParamId(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
        }
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Param {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// A resolved function body over one or two parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub body: Box<QueryExpr>,
}

/// Query-Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryExpr {
    /// Value captured from the calling scope. `Value::Table` names a table.
    Constant(Value),
    Parameter(Param),
    Member {
        object: Box<QueryExpr>,
        name: String,
    },
    Binary {
        left: Box<QueryExpr>,
        op: BinaryOp,
        right: Box<QueryExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<QueryExpr>,
    },
    /// Value written inline in the lambda body.
    Literal(Value),
    /// Operator application; `source` is the receiver.
    Call {
        source: Box<QueryExpr>,
        method: String,
        args: Vec<QueryExpr>,
    },
    Lambda(Lambda),
    /// Object/record projection, properties in declaration order.
    NewObject(Vec<(String, QueryExpr)>),
    /// Makes named values and sub-queries visible to lambdas nested under `source`.
    Scope {
        source: Box<QueryExpr>,
        bindings: BTreeMap<String, QueryExpr>,
    },
    /// `test ? if_true : if_false`
    Conditional {
        test: Box<QueryExpr>,
        if_true: Box<QueryExpr>,
        if_false: Box<QueryExpr>,
    },
}

impl QueryExpr {
    pub fn table(name: &str) -> Self {
        QueryExpr::Constant(Value::Table(name.to_string()))
    }

    pub fn param(param: &Param) -> Self {
        QueryExpr::Parameter(param.clone())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        QueryExpr::Literal(value.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        QueryExpr::Constant(value.into())
    }

    pub fn member(object: QueryExpr, name: &str) -> Self {
        QueryExpr::Member {
            object: Box::new(object),
            name: name.to_string(),
        }
    }

    pub fn binary(left: QueryExpr, op: BinaryOp, right: QueryExpr) -> Self {
        QueryExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn call(source: QueryExpr, method: &str, args: Vec<QueryExpr>) -> Self {
        QueryExpr::Call {
            source: Box::new(source),
            method: method.to_string(),
            args,
        }
    }

    pub fn lambda(params: Vec<Param>, body: QueryExpr) -> Self {
        QueryExpr::Lambda(Lambda {
            params,
            body: Box::new(body),
        })
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            QueryExpr::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// The method name if this node is an operator call.
    pub fn method_name(&self) -> Option<&str> {
        match self {
            QueryExpr::Call { method, .. } => Some(method),
            _ => None,
        }
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpr::Constant(value) | QueryExpr::Literal(value) => write!(f, "{}", value),
            QueryExpr::Parameter(param) => write!(f, "{}", param.name),
            QueryExpr::Member { object, name } => write!(f, "{}.{}", object, name),
            QueryExpr::Binary { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            QueryExpr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Negate => write!(f, "-{}", operand),
            },
            QueryExpr::Call {
                source,
                method,
                args,
            } => {
                write!(f, "{}.{}(", source, method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            QueryExpr::Lambda(lambda) => {
                let names: Vec<&str> = lambda.params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "({}) => {}", names.join(", "), lambda.body)
            }
            QueryExpr::NewObject(properties) => {
                write!(f, "{{ ")?;
                for (i, (name, value)) in properties.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            QueryExpr::Scope { source, bindings } => {
                let names: Vec<&str> = bindings.keys().map(String::as_str).collect();
                write!(f, "{}.provideScope({{ {} }})", source, names.join(", "))
            }
            QueryExpr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", test, if_true, if_false),
        }
    }
}
