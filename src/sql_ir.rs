// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SQL Intermediate Representation (IR)
//!
//! This module defines the tree the translators build and the code generator
//! renders. It mirrors the structure of a SQL Server statement (SELECT with
//! joins, grouping, paging, set operations and correlated subqueries) and is
//! serializable so a translated query can be dumped for diagnostics.
//!
//! Every transformation returns a new node. Methods that look like setters
//! consume `self` and hand back the rewritten value.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::query_ir::BinaryOp;
use crate::value::Value;

lazy_static! {
    /// Function names that aggregate over a row set.
    pub static ref AGGREGATE_FUNCTIONS: BTreeSet<&'static str> =
        ["COUNT", "SUM", "AVG", "MIN", "MAX"].into_iter().collect();
}

/// Table reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub alias: String,
}

/// Column reference qualified by the alias of its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub table: String,
}

impl Column {
    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

/// SQL binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlBinaryOp {
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl SqlBinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            SqlBinaryOp::Equal
                | SqlBinaryOp::NotEqual
                | SqlBinaryOp::LessThan
                | SqlBinaryOp::LessThanOrEqual
                | SqlBinaryOp::GreaterThan
                | SqlBinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, SqlBinaryOp::And | SqlBinaryOp::Or)
    }

    /// The operator that keeps the meaning when both operands swap sides.
    pub fn flipped(self) -> Self {
        match self {
            SqlBinaryOp::LessThan => SqlBinaryOp::GreaterThan,
            SqlBinaryOp::LessThanOrEqual => SqlBinaryOp::GreaterThanOrEqual,
            SqlBinaryOp::GreaterThan => SqlBinaryOp::LessThan,
            SqlBinaryOp::GreaterThanOrEqual => SqlBinaryOp::LessThanOrEqual,
            other => other,
        }
    }
}

impl TryFrom<BinaryOp> for SqlBinaryOp {
    type Error = BinaryOp;

    fn try_from(op: BinaryOp) -> Result<Self, BinaryOp> {
        Ok(match op {
            BinaryOp::Equal => SqlBinaryOp::Equal,
            BinaryOp::NotEqual => SqlBinaryOp::NotEqual,
            BinaryOp::LessThan => SqlBinaryOp::LessThan,
            BinaryOp::LessThanOrEqual => SqlBinaryOp::LessThanOrEqual,
            BinaryOp::GreaterThan => SqlBinaryOp::GreaterThan,
            BinaryOp::GreaterThanOrEqual => SqlBinaryOp::GreaterThanOrEqual,
            BinaryOp::And => SqlBinaryOp::And,
            BinaryOp::Or => SqlBinaryOp::Or,
            BinaryOp::Add => SqlBinaryOp::Add,
            BinaryOp::Subtract => SqlBinaryOp::Subtract,
            BinaryOp::Multiply => SqlBinaryOp::Multiply,
            BinaryOp::Divide => SqlBinaryOp::Divide,
            BinaryOp::Modulo => SqlBinaryOp::Modulo,
            BinaryOp::Coalesce => return Err(op),
        })
    }
}

/// One `WHEN ... THEN ...` arm of a CASE expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub when: SqlExpr,
    pub then: SqlExpr,
}

/// Where the generator places `%` wildcards around a LIKE pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikePosition {
    StartsWith,
    EndsWith,
    Contains,
}

/// `FOR JSON PATH` names columns by alias; `FOR JSON AUTO` nests by source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonMode {
    #[default]
    Path,
    Auto,
}

/// SQL Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlExpr {
    Table(Table),
    Column(Column),
    Constant(Value),
    Binary {
        left: Box<SqlExpr>,
        op: SqlBinaryOp,
        right: Box<SqlExpr>,
    },
    Not(Box<SqlExpr>),
    Negate(Box<SqlExpr>),
    FunctionCall {
        name: String,
        args: Vec<SqlExpr>,
    },
    Case {
        when_clauses: Vec<WhenClause>,
        else_result: Option<Box<SqlExpr>>,
    },
    Like {
        source: Box<SqlExpr>,
        pattern: Box<SqlExpr>,
        position: LikePosition,
    },
    In {
        value: Box<SqlExpr>,
        candidates: Vec<SqlExpr>,
    },
    Exists(Box<Select>),
    ScalarSubquery(Box<Select>),
    ScalarSubqueryAsJson {
        select: Box<Select>,
        mode: JsonMode,
        include_nulls: bool,
        without_array_wrapper: bool,
    },
    Select(Box<Select>),
    Union(Union),
}

impl SqlExpr {
    pub fn column(table: &str, name: &str) -> Self {
        SqlExpr::Column(Column {
            name: name.to_string(),
            table: table.to_string(),
        })
    }

    pub fn wildcard(table: &str) -> Self {
        Self::column(table, "*")
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        SqlExpr::Constant(value.into())
    }

    pub fn null() -> Self {
        SqlExpr::Constant(Value::Null)
    }

    pub fn binary(left: SqlExpr, op: SqlBinaryOp, right: SqlExpr) -> Self {
        SqlExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn equals(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(left, SqlBinaryOp::Equal, right)
    }

    pub fn and(left: SqlExpr, right: SqlExpr) -> Self {
        Self::binary(left, SqlBinaryOp::And, right)
    }

    pub fn function(name: &str, args: Vec<SqlExpr>) -> Self {
        SqlExpr::FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, SqlExpr::Constant(Value::Null))
    }

    /// True for expressions SQL Server accepts directly as a search condition.
    pub fn is_predicate(&self) -> bool {
        match self {
            SqlExpr::Binary { op, .. } => op.is_comparison() || op.is_logical(),
            SqlExpr::Not(_) | SqlExpr::Like { .. } | SqlExpr::In { .. } | SqlExpr::Exists(_) => {
                true
            }
            _ => false,
        }
    }

    /// True for a call of one of the SQL aggregate functions.
    pub fn is_aggregate_call(&self) -> bool {
        match self {
            SqlExpr::FunctionCall { name, .. } => AGGREGATE_FUNCTIONS.contains(name.as_str()),
            _ => false,
        }
    }

    /// Whether this node is a row source rather than a scalar.
    pub fn is_source(&self) -> bool {
        matches!(self, SqlExpr::Table(_) | SqlExpr::Select(_) | SqlExpr::Union(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SqlExpr::Table(_) => "table",
            SqlExpr::Column(_) => "column",
            SqlExpr::Constant(_) => "constant",
            SqlExpr::Binary { .. } => "binary expression",
            SqlExpr::Not(_) => "NOT",
            SqlExpr::Negate(_) => "negation",
            SqlExpr::FunctionCall { .. } => "function call",
            SqlExpr::Case { .. } => "CASE",
            SqlExpr::Like { .. } => "LIKE",
            SqlExpr::In { .. } => "IN",
            SqlExpr::Exists(_) => "EXISTS",
            SqlExpr::ScalarSubquery(_) => "scalar subquery",
            SqlExpr::ScalarSubqueryAsJson { .. } => "JSON subquery",
            SqlExpr::Select(_) => "select",
            SqlExpr::Union(_) => "union",
        }
    }
}

/// Output column of a SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub expression: SqlExpr,
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(expression: SqlExpr, alias: Option<String>) -> Self {
        Self { expression, alias }
    }

    /// The name the column is visible under to an enclosing query.
    pub fn output_name(&self) -> Option<&str> {
        match (&self.alias, &self.expression) {
            (Some(alias), _) => Some(alias),
            (None, SqlExpr::Column(column)) if !column.is_wildcard() => Some(&column.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub expression: SqlExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub source: SqlSource,
    pub predicate: SqlExpr,
}

/// Anything that can appear in FROM or JOIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlSource {
    Table(Table),
    Select(Box<Select>),
    Union(Union),
}

impl SqlSource {
    pub fn alias(&self) -> &str {
        match self {
            SqlSource::Table(table) => &table.alias,
            SqlSource::Select(select) => &select.alias,
            SqlSource::Union(union) => &union.alias,
        }
    }
}

impl From<SqlSource> for SqlExpr {
    fn from(source: SqlSource) -> Self {
        match source {
            SqlSource::Table(table) => SqlExpr::Table(table),
            SqlSource::Select(select) => SqlExpr::Select(select),
            SqlSource::Union(union) => SqlExpr::Union(union),
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub alias: String,
    /// Empty means the implicit wildcard of the FROM source.
    pub projections: Vec<Projection>,
    pub from: Option<SqlSource>,
    pub predicate: Option<SqlExpr>,
    pub having: Option<SqlExpr>,
    pub joins: Vec<Join>,
    pub orderings: Vec<Ordering>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub group_by: Vec<SqlExpr>,
}

impl Select {
    /// `SELECT * FROM source`
    pub fn from_source(alias: String, source: SqlSource) -> Self {
        Self {
            alias,
            projections: Vec::new(),
            from: Some(source),
            predicate: None,
            having: None,
            joins: Vec::new(),
            orderings: Vec::new(),
            offset: None,
            limit: None,
            group_by: Vec::new(),
        }
    }

    pub fn is_paged(&self) -> bool {
        self.offset.is_some() || self.limit.is_some()
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// No joins, paging or grouping: the select is a plain filtered projection.
    pub fn is_simple(&self) -> bool {
        self.joins.is_empty() && !self.is_paged() && !self.is_grouped()
    }

    pub fn with_predicate(mut self, predicate: SqlExpr) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => SqlExpr::and(existing, predicate),
            None => predicate,
        });
        self
    }

    pub fn with_having(mut self, predicate: SqlExpr) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => SqlExpr::and(existing, predicate),
            None => predicate,
        });
        self
    }

    pub fn with_projections(mut self, projections: Vec<Projection>) -> Self {
        self.projections = projections;
        self
    }

    pub fn with_alias(mut self, alias: String) -> Self {
        self.alias = alias;
        self
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_orderings(mut self, orderings: Vec<Ordering>) -> Self {
        self.orderings = orderings;
        self
    }

    pub fn without_paging(mut self) -> Self {
        self.orderings.clear();
        self.offset = None;
        self.limit = None;
        self
    }

    /// The single aggregate call this select projects, if that is all it does.
    pub fn single_aggregate(&self) -> Option<&SqlExpr> {
        match self.projections.as_slice() {
            [projection] if projection.expression.is_aggregate_call() && self.is_simple() => {
                Some(&projection.expression)
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable select: {}>", e))
    }
}

/// UNION / UNION ALL of several selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub sources: Vec<Select>,
    pub alias: String,
    pub distinct: bool,
}
