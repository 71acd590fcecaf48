// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SQL IR to SQL Server Text
//!
//! A second, independent walk over the finished SQL IR. It owns every
//! dialect detail: bracket-quoted identifiers, literal escaping, `IS NULL`
//! rewriting, LIKE pattern escaping, OFFSET/FETCH paging and `FOR JSON`
//! subqueries.

use core::fmt;

use anyhow::{bail, Result};
use tracing::debug;

use crate::config::TranslatorConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::sql_ir::*;
use crate::value::Value;

/// Error types for SQL text generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A table, derived table or union rendered as a source without an alias.
    MissingAlias(String),
    /// A SELECT with nothing to select from.
    MissingFrom(String),
    /// A constant with no SQL literal form.
    InvalidConstant(String),
    /// A node that cannot appear where it was found.
    UnsupportedNode(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::MissingAlias(what) => write!(f, "{} has no alias", what),
            GenerationError::MissingFrom(alias) => {
                write!(f, "select `{}` has no FROM source", alias)
            }
            GenerationError::InvalidConstant(what) => {
                write!(f, "constant has no SQL literal form: {}", what)
            }
            GenerationError::UnsupportedNode(what) => {
                write!(f, "cannot generate SQL for {}", what)
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// Binding strength, weakest first. An operand binding more weakly than its
/// parent is parenthesized.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
enum Precedence {
    Case,
    Or,
    And,
    Not,
    Comparison,
    Additive,
    Multiplicative,
    Unary,
    Atom,
}

impl Precedence {
    fn of(expr: &SqlExpr) -> Self {
        match expr {
            SqlExpr::Binary { op, .. } => Self::of_operator(*op),
            SqlExpr::Not(_) => Precedence::Not,
            SqlExpr::Like { .. } | SqlExpr::In { .. } => Precedence::Comparison,
            SqlExpr::Negate(_) => Precedence::Unary,
            SqlExpr::Case { .. } => Precedence::Case,
            _ => Precedence::Atom,
        }
    }

    fn of_operator(op: SqlBinaryOp) -> Self {
        match op {
            SqlBinaryOp::Or => Precedence::Or,
            SqlBinaryOp::And => Precedence::And,
            SqlBinaryOp::Add | SqlBinaryOp::Subtract => Precedence::Additive,
            SqlBinaryOp::Multiply | SqlBinaryOp::Divide | SqlBinaryOp::Modulo => {
                Precedence::Multiplicative
            }
            _ => Precedence::Comparison,
        }
    }
}

fn operator_symbol(op: SqlBinaryOp) -> &'static str {
    match op {
        SqlBinaryOp::Equal => "=",
        SqlBinaryOp::NotEqual => "<>",
        SqlBinaryOp::LessThan => "<",
        SqlBinaryOp::LessThanOrEqual => "<=",
        SqlBinaryOp::GreaterThan => ">",
        SqlBinaryOp::GreaterThanOrEqual => ">=",
        SqlBinaryOp::And => "AND",
        SqlBinaryOp::Or => "OR",
        SqlBinaryOp::Add => "+",
        SqlBinaryOp::Subtract => "-",
        SqlBinaryOp::Multiply => "*",
        SqlBinaryOp::Divide => "/",
        SqlBinaryOp::Modulo => "%",
    }
}

fn is_associative(op: SqlBinaryOp) -> bool {
    matches!(
        op,
        SqlBinaryOp::And | SqlBinaryOp::Or | SqlBinaryOp::Add | SqlBinaryOp::Multiply
    )
}

/// `[name]` with `]` doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `'text'` with `'` doubled.
pub fn quote_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Escape the LIKE metacharacters of a literal pattern.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            '%' => escaped.push_str("[%]"),
            '_' => escaped.push_str("[_]"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// SQL Server code generator
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    /// One clause per line, subqueries indented
    pretty_print: bool,
    indent_width: usize,
    diagnostics: Diagnostics,
}

impl Default for SqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlGenerator {
    pub fn new() -> Self {
        Self {
            pretty_print: false,
            indent_width: 4,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self::new()
            .with_pretty_print(config.pretty_print)
            .with_indent_width(config.indent_width)
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    /// Generate SQL text from IR
    pub fn generate(&mut self, expr: &SqlExpr) -> Result<String> {
        debug!("generating SQL for a {}", expr.kind());
        match expr {
            SqlExpr::Select(select) => self.generate_select(select),
            SqlExpr::Union(union) => self.generate_union(union),
            other => self.generate_expression(other),
        }
    }

    fn separator(&self) -> &'static str {
        if self.pretty_print {
            "\n"
        } else {
            " "
        }
    }

    fn wrap_subquery(&self, sql: &str) -> String {
        if self.pretty_print {
            let indent = " ".repeat(self.indent_width);
            let body = sql
                .lines()
                .map(|line| format!("{}{}", indent, line))
                .collect::<Vec<_>>()
                .join("\n");
            format!("(\n{}\n)", body)
        } else {
            format!("({})", sql)
        }
    }

    fn generate_select(&mut self, select: &Select) -> Result<String> {
        let from = match &select.from {
            Some(from) => from,
            None => bail!(GenerationError::MissingFrom(select.alias.clone())),
        };

        let mut clauses = vec![format!(
            "SELECT {}",
            self.generate_projections(select, from)?
        )];
        clauses.push(format!("FROM {}", self.generate_source(from)?));

        for join in &select.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            clauses.push(format!(
                "{} {} ON {}",
                keyword,
                self.generate_source(&join.source)?,
                self.generate_expression(&join.predicate)?
            ));
        }

        // FETCH NEXT 0 ROWS is rejected, so an empty page filters everything out instead.
        let empty_page = select.limit == Some(0);
        if empty_page {
            debug!("select `{}` takes no rows", select.alias);
            let never = SqlExpr::equals(SqlExpr::constant(1), SqlExpr::constant(0));
            let predicate = match &select.predicate {
                Some(predicate) => SqlExpr::and(predicate.clone(), never),
                None => never,
            };
            clauses.push(format!("WHERE {}", self.generate_expression(&predicate)?));
        } else if let Some(predicate) = &select.predicate {
            clauses.push(format!("WHERE {}", self.generate_expression(predicate)?));
        }

        if !select.group_by.is_empty() {
            let keys = select
                .group_by
                .iter()
                .map(|key| self.generate_expression(key))
                .collect::<Result<Vec<_>>>()?;
            clauses.push(format!("GROUP BY {}", keys.join(", ")));
        }

        if let Some(having) = &select.having {
            clauses.push(format!("HAVING {}", self.generate_expression(having)?));
        }

        if empty_page {
            return Ok(clauses.join(self.separator()));
        }

        if !select.orderings.is_empty() {
            let orderings = select
                .orderings
                .iter()
                .map(|ordering| self.generate_ordering(ordering))
                .collect::<Result<Vec<_>>>()?;
            clauses.push(format!("ORDER BY {}", orderings.join(", ")));
        } else if select.is_paged() {
            self.diagnostics.report(Diagnostic::MissingOrderBy {
                select_alias: select.alias.clone(),
            });
            clauses.push("ORDER BY (SELECT NULL)".to_string());
        }

        if select.is_paged() {
            let mut paging = format!("OFFSET {} ROWS", select.offset.unwrap_or(0));
            if let Some(limit) = select.limit {
                paging.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
            }
            clauses.push(paging);
        }

        Ok(clauses.join(self.separator()))
    }

    fn generate_projections(&mut self, select: &Select, from: &SqlSource) -> Result<String> {
        if select.projections.is_empty() {
            self.diagnostics.report(Diagnostic::ImplicitWildcard {
                source_alias: from.alias().to_string(),
            });
            return Ok(format!("{}.*", quote_identifier(from.alias())));
        }

        let projections = select
            .projections
            .iter()
            .map(|projection| self.generate_projection(projection))
            .collect::<Result<Vec<_>>>()?;
        Ok(projections.join(", "))
    }

    fn generate_projection(&mut self, projection: &Projection) -> Result<String> {
        let expr = self.generate_expression(&projection.expression)?;
        Ok(match (&projection.alias, &projection.expression) {
            (Some(alias), SqlExpr::Column(column)) if column.name == *alias => expr,
            (Some(alias), _) => format!("{} AS {}", expr, quote_identifier(alias)),
            (None, _) => expr,
        })
    }

    fn generate_ordering(&mut self, ordering: &Ordering) -> Result<String> {
        let expr = self.generate_expression(&ordering.expression)?;
        Ok(match ordering.direction {
            SortDirection::Ascending => expr,
            SortDirection::Descending => format!("{} DESC", expr),
        })
    }

    fn generate_source(&mut self, source: &SqlSource) -> Result<String> {
        let alias = source.alias();
        let rendered = match source {
            SqlSource::Table(table) => {
                if alias.is_empty() {
                    bail!(GenerationError::MissingAlias(format!("table `{}`", table.name)));
                }
                quote_identifier(&table.name)
            }
            SqlSource::Select(select) => {
                if alias.is_empty() {
                    bail!(GenerationError::MissingAlias("derived table".to_string()));
                }
                let sql = self.generate_select(select)?;
                self.wrap_subquery(&sql)
            }
            SqlSource::Union(union) => {
                if alias.is_empty() {
                    bail!(GenerationError::MissingAlias("union".to_string()));
                }
                let sql = self.generate_union(union)?;
                self.wrap_subquery(&sql)
            }
        };
        Ok(format!("{} AS {}", rendered, quote_identifier(alias)))
    }

    fn generate_union(&mut self, union: &Union) -> Result<String> {
        if union.sources.is_empty() {
            bail!(GenerationError::UnsupportedNode(format!(
                "union `{}` without members",
                union.alias
            )));
        }
        let keyword = if union.distinct { "UNION" } else { "UNION ALL" };
        let joiner = format!("{}{}{}", self.separator(), keyword, self.separator());
        let members = union
            .sources
            .iter()
            .map(|select| self.generate_select(select))
            .collect::<Result<Vec<_>>>()?;
        Ok(members.join(&joiner))
    }

    /// Parenthesize `expr` when it binds no tighter than `parent`.
    fn format_sub_expr(&mut self, parent: Precedence, expr: &SqlExpr) -> Result<String> {
        let sql = self.generate_expression(expr)?;
        if parent >= Precedence::of(expr) {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    /// Parenthesize `expr` only when it binds more weakly than `parent`.
    fn strict_format_sub_expr(&mut self, parent: Precedence, expr: &SqlExpr) -> Result<String> {
        let sql = self.generate_expression(expr)?;
        if parent > Precedence::of(expr) {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    fn generate_expression(&mut self, expr: &SqlExpr) -> Result<String> {
        match expr {
            SqlExpr::Column(column) => {
                if column.table.is_empty() {
                    bail!(GenerationError::MissingAlias(format!(
                        "column `{}`",
                        column.name
                    )));
                }
                if column.is_wildcard() {
                    Ok(format!("{}.*", quote_identifier(&column.table)))
                } else {
                    Ok(format!(
                        "{}.{}",
                        quote_identifier(&column.table),
                        quote_identifier(&column.name)
                    ))
                }
            }
            SqlExpr::Constant(value) => generate_constant(value),
            SqlExpr::Binary { left, op, right } => self.generate_binary(left, *op, right),
            SqlExpr::Not(inner) => match inner.as_ref() {
                SqlExpr::Exists(select) => {
                    let sql = self.generate_select(select)?;
                    Ok(format!("NOT EXISTS {}", self.wrap_subquery(&sql)))
                }
                other => Ok(format!(
                    "NOT {}",
                    self.format_sub_expr(Precedence::Unary, other)?
                )),
            },
            SqlExpr::Negate(inner) => {
                let operand = self.format_sub_expr(Precedence::Unary, inner)?;
                Ok(format!("-{}", guard_leading_minus(operand)))
            }
            SqlExpr::FunctionCall { name, args } => self.generate_function(name, args),
            SqlExpr::Case {
                when_clauses,
                else_result,
            } => {
                if when_clauses.is_empty() {
                    bail!(GenerationError::UnsupportedNode(
                        "CASE without WHEN clauses".to_string()
                    ));
                }
                let mut sql = "CASE".to_string();
                for clause in when_clauses {
                    sql.push_str(&format!(
                        " WHEN {} THEN {}",
                        self.generate_expression(&clause.when)?,
                        self.generate_expression(&clause.then)?
                    ));
                }
                if let Some(otherwise) = else_result {
                    sql.push_str(&format!(" ELSE {}", self.generate_expression(otherwise)?));
                }
                sql.push_str(" END");
                Ok(sql)
            }
            SqlExpr::Like {
                source,
                pattern,
                position,
            } => {
                let source = self.format_sub_expr(Precedence::Comparison, source)?;
                let pattern = self.generate_like_pattern(pattern, *position)?;
                Ok(format!("{} LIKE {}", source, pattern))
            }
            SqlExpr::In { value, candidates } => {
                if candidates.is_empty() {
                    bail!(GenerationError::UnsupportedNode(
                        "IN with no candidates".to_string()
                    ));
                }
                let value = self.format_sub_expr(Precedence::Comparison, value)?;
                let candidates = candidates
                    .iter()
                    .map(|candidate| self.generate_expression(candidate))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{} IN ({})", value, candidates.join(", ")))
            }
            SqlExpr::Exists(select) => {
                let sql = self.generate_select(select)?;
                Ok(format!("EXISTS {}", self.wrap_subquery(&sql)))
            }
            SqlExpr::ScalarSubquery(select) | SqlExpr::Select(select) => {
                let sql = self.generate_select(select)?;
                Ok(self.wrap_subquery(&sql))
            }
            SqlExpr::ScalarSubqueryAsJson {
                select,
                mode,
                include_nulls,
                without_array_wrapper,
            } => self.generate_json_subquery(select, *mode, *include_nulls, *without_array_wrapper),
            SqlExpr::Union(union) => {
                let sql = self.generate_union(union)?;
                Ok(self.wrap_subquery(&sql))
            }
            SqlExpr::Table(table) => bail!(GenerationError::UnsupportedNode(format!(
                "table `{}` in expression position",
                table.name
            ))),
        }
    }

    fn generate_binary(
        &mut self,
        left: &SqlExpr,
        op: SqlBinaryOp,
        right: &SqlExpr,
    ) -> Result<String> {
        if matches!(op, SqlBinaryOp::Equal | SqlBinaryOp::NotEqual) {
            let tested = if right.is_null_constant() {
                Some(left)
            } else if left.is_null_constant() {
                Some(right)
            } else {
                None
            };
            if let Some(tested) = tested {
                let negation = if op == SqlBinaryOp::NotEqual { "NOT " } else { "" };
                let tested = self.format_sub_expr(Precedence::Comparison, tested)?;
                return Ok(format!("{} IS {}NULL", tested, negation));
            }
        }

        let precedence = Precedence::of_operator(op);
        let left = self.strict_format_sub_expr(precedence, left)?;
        let right = if is_associative(op) {
            self.strict_format_sub_expr(precedence, right)?
        } else {
            self.format_sub_expr(precedence, right)?
        };
        let right = if op == SqlBinaryOp::Subtract {
            guard_leading_minus(right)
        } else {
            right
        };
        Ok(format!("{} {} {}", left, operator_symbol(op), right))
    }

    fn generate_function(&mut self, name: &str, args: &[SqlExpr]) -> Result<String> {
        let mut rendered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            // DATEPART takes its first argument as a bare keyword.
            if i == 0 && name.eq_ignore_ascii_case("DATEPART") {
                match arg {
                    SqlExpr::Constant(Value::String(part))
                        if !part.is_empty() && part.chars().all(|c| c.is_ascii_alphabetic()) =>
                    {
                        rendered.push(part.clone());
                        continue;
                    }
                    other => bail!(GenerationError::InvalidConstant(format!(
                        "DATEPART part must be a keyword, got a {}",
                        other.kind()
                    ))),
                }
            }
            rendered.push(self.generate_expression(arg)?);
        }
        Ok(format!("{}({})", name, rendered.join(", ")))
    }

    fn generate_like_pattern(&mut self, pattern: &SqlExpr, position: LikePosition) -> Result<String> {
        if let SqlExpr::Constant(Value::String(text)) = pattern {
            let escaped = escape_like(text);
            let pattern = match position {
                LikePosition::StartsWith => format!("{}%", escaped),
                LikePosition::EndsWith => format!("%{}", escaped),
                LikePosition::Contains => format!("%{}%", escaped),
            };
            return Ok(quote_string(&pattern));
        }

        let dynamic = format!(
            "REPLACE(REPLACE(REPLACE({}, '[', '[[]'), '%', '[%]'), '_', '[_]')",
            self.generate_expression(pattern)?
        );
        Ok(match position {
            LikePosition::StartsWith => format!("{} + '%'", dynamic),
            LikePosition::EndsWith => format!("'%' + {}", dynamic),
            LikePosition::Contains => format!("'%' + {} + '%'", dynamic),
        })
    }

    fn generate_json_subquery(
        &mut self,
        select: &Select,
        mode: JsonMode,
        include_nulls: bool,
        without_array_wrapper: bool,
    ) -> Result<String> {
        let mut options = vec![match mode {
            JsonMode::Path => "FOR JSON PATH",
            JsonMode::Auto => "FOR JSON AUTO",
        }];
        if include_nulls {
            options.push("INCLUDE_NULL_VALUES");
        }
        if without_array_wrapper {
            options.push("WITHOUT_ARRAY_WRAPPER");
        }

        let body = format!(
            "{}{}{}",
            self.generate_select(select)?,
            self.separator(),
            options.join(", ")
        );
        let subquery = self.wrap_subquery(&body);
        if without_array_wrapper {
            Ok(subquery)
        } else {
            Ok(format!("JSON_QUERY(COALESCE({}, '[]'))", subquery))
        }
    }
}

/// `--` opens a line comment, so a second minus needs parentheses.
fn guard_leading_minus(sql: String) -> String {
    if sql.starts_with('-') {
        format!("({})", sql)
    } else {
        sql
    }
}

fn generate_constant(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if !f.is_finite() {
                bail!(GenerationError::InvalidConstant(f.to_string()));
            }
            // Debug keeps the fraction or exponent, so `2.0` stays a float.
            format!("{:?}", f)
        }
        Value::String(s) => quote_string(s),
        Value::DateTime(dt) => quote_string(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::Array(_) | Value::Table(_) => bail!(GenerationError::InvalidConstant(format!(
            "{} value `{}`",
            value.type_name(),
            value
        ))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn users() -> SqlSource {
        SqlSource::Table(Table {
            name: "Users".to_string(),
            alias: "u".to_string(),
        })
    }

    fn users_select() -> Select {
        Select::from_source("s".to_string(), users())
    }

    fn compact(expr: &SqlExpr) -> String {
        SqlGenerator::new().generate(expr).unwrap()
    }

    fn age() -> SqlExpr {
        SqlExpr::column("u", "age")
    }

    #[test]
    fn test_identifier_and_string_escaping() {
        assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
        assert_eq!(quote_string("O'Brien"), "'O''Brien'");
        assert_eq!(
            compact(&SqlExpr::equals(
                SqlExpr::column("u", "last]name"),
                SqlExpr::constant("O'Brien")
            )),
            "[u].[last]]name] = 'O''Brien'"
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(compact(&SqlExpr::constant(true)), "1");
        assert_eq!(compact(&SqlExpr::constant(false)), "0");
        assert_eq!(compact(&SqlExpr::constant(2.5)), "2.5");
        assert_eq!(compact(&SqlExpr::constant(2.0)), "2.0");
        assert_eq!(compact(&SqlExpr::constant(-0.25)), "-0.25");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 0))
            .unwrap();
        assert_eq!(compact(&SqlExpr::constant(date)), "'2024-03-09T14:05:00'");

        let err = SqlGenerator::new()
            .generate(&SqlExpr::constant(f64::NAN))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::InvalidConstant(_))
        ));
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(
            compact(&SqlExpr::equals(age(), SqlExpr::null())),
            "[u].[age] IS NULL"
        );
        assert_eq!(
            compact(&SqlExpr::binary(
                SqlExpr::null(),
                SqlBinaryOp::NotEqual,
                age()
            )),
            "[u].[age] IS NOT NULL"
        );
    }

    #[test]
    fn test_precedence() {
        let a = SqlExpr::equals(SqlExpr::column("u", "a"), SqlExpr::constant(1));
        let b = SqlExpr::equals(SqlExpr::column("u", "b"), SqlExpr::constant(2));
        let c = SqlExpr::equals(SqlExpr::column("u", "c"), SqlExpr::constant(3));

        let or_in_and = SqlExpr::and(SqlExpr::binary(a.clone(), SqlBinaryOp::Or, b.clone()), c.clone());
        assert_eq!(
            compact(&or_in_and),
            "([u].[a] = 1 OR [u].[b] = 2) AND [u].[c] = 3"
        );

        let and_in_or = SqlExpr::binary(SqlExpr::and(a, b), SqlBinaryOp::Or, c);
        assert_eq!(
            compact(&and_in_or),
            "[u].[a] = 1 AND [u].[b] = 2 OR [u].[c] = 3"
        );

        let nested_minus = SqlExpr::binary(
            SqlExpr::column("u", "x"),
            SqlBinaryOp::Subtract,
            SqlExpr::binary(
                SqlExpr::column("u", "y"),
                SqlBinaryOp::Subtract,
                SqlExpr::column("u", "z"),
            ),
        );
        assert_eq!(compact(&nested_minus), "[u].[x] - ([u].[y] - [u].[z])");

        let product_of_sum = SqlExpr::binary(
            SqlExpr::binary(age(), SqlBinaryOp::Add, SqlExpr::constant(1)),
            SqlBinaryOp::Multiply,
            SqlExpr::constant(2),
        );
        assert_eq!(compact(&product_of_sum), "([u].[age] + 1) * 2");

        let double_negation = SqlExpr::Negate(Box::new(SqlExpr::Negate(Box::new(age()))));
        assert_eq!(compact(&double_negation), "-(-[u].[age])");
    }

    #[test]
    fn test_minus_never_doubles() {
        let negated = SqlExpr::Negate(Box::new(SqlExpr::constant(-5)));
        assert_eq!(compact(&negated), "-(-5)");

        let negated_float = SqlExpr::Negate(Box::new(SqlExpr::constant(-2.5)));
        assert_eq!(compact(&negated_float), "-(-2.5)");

        let difference = SqlExpr::binary(age(), SqlBinaryOp::Subtract, SqlExpr::constant(-5));
        assert_eq!(compact(&difference), "[u].[age] - (-5)");

        let sum = SqlExpr::binary(age(), SqlBinaryOp::Add, SqlExpr::constant(-5));
        assert_eq!(compact(&sum), "[u].[age] + -5");

        let compared = SqlExpr::binary(age(), SqlBinaryOp::GreaterThan, negated);
        assert_eq!(compact(&compared), "[u].[age] > -(-5)");
    }

    #[test]
    fn test_like_escaping() {
        let like = |pattern: &str, position| SqlExpr::Like {
            source: Box::new(SqlExpr::column("u", "name")),
            pattern: Box::new(SqlExpr::constant(pattern)),
            position,
        };
        assert_eq!(
            compact(&like("50%_[x]", LikePosition::Contains)),
            "[u].[name] LIKE '%50[%][_][[]x]%'"
        );
        assert_eq!(
            compact(&like("O'", LikePosition::StartsWith)),
            "[u].[name] LIKE 'O''%'"
        );

        let dynamic = SqlExpr::Like {
            source: Box::new(SqlExpr::column("u", "name")),
            pattern: Box::new(SqlExpr::column("u", "suffix")),
            position: LikePosition::EndsWith,
        };
        assert_eq!(
            compact(&dynamic),
            "[u].[name] LIKE '%' + REPLACE(REPLACE(REPLACE([u].[suffix], '[', '[[]'), '%', '[%]'), '_', '[_]')"
        );

        let prefix = SqlExpr::Like {
            source: Box::new(SqlExpr::column("u", "name")),
            pattern: Box::new(SqlExpr::column("u", "prefix")),
            position: LikePosition::StartsWith,
        };
        assert_eq!(
            compact(&prefix),
            "[u].[name] LIKE REPLACE(REPLACE(REPLACE([u].[prefix], '[', '[[]'), '%', '[%]'), '_', '[_]') + '%'"
        );
    }

    #[test]
    fn test_datepart_keyword() {
        let expr = SqlExpr::function(
            "DATEPART",
            vec![SqlExpr::constant("year"), SqlExpr::column("u", "createdAt")],
        );
        assert_eq!(compact(&expr), "DATEPART(year, [u].[createdAt])");

        let injected = SqlExpr::function(
            "DATEPART",
            vec![SqlExpr::constant("year) --"), SqlExpr::column("u", "createdAt")],
        );
        assert!(SqlGenerator::new().generate(&injected).is_err());
    }

    #[test]
    fn test_paging_without_order_reports() {
        let mut select = users_select();
        select.offset = Some(5);
        select.limit = Some(10);
        let mut generator = SqlGenerator::new();
        let sql = generator
            .generate(&SqlExpr::Select(Box::new(select)))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT [u].* FROM [Users] AS [u] ORDER BY (SELECT NULL) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert!(generator.diagnostics().has_missing_order_by());
    }

    #[test]
    fn test_empty_page_filters_everything() {
        let mut taken = users_select().with_orderings(vec![Ordering {
            expression: age(),
            direction: SortDirection::Ascending,
        }]);
        taken.limit = Some(0);
        let mut generator = SqlGenerator::new();
        let sql = generator
            .generate(&SqlExpr::Select(Box::new(taken.clone())))
            .unwrap();
        assert_eq!(sql, "SELECT [u].* FROM [Users] AS [u] WHERE 1 = 0");
        assert!(!generator.diagnostics().has_missing_order_by());

        let mut skipped = taken.with_predicate(SqlExpr::binary(
            age(),
            SqlBinaryOp::GreaterThan,
            SqlExpr::constant(30),
        ));
        skipped.offset = Some(20);
        assert_eq!(
            compact(&SqlExpr::Select(Box::new(skipped))),
            "SELECT [u].* FROM [Users] AS [u] WHERE [u].[age] > 30 AND 1 = 0"
        );
    }

    #[test]
    fn test_limit_only_and_descending() {
        let mut select = users_select().with_orderings(vec![Ordering {
            expression: age(),
            direction: SortDirection::Descending,
        }]);
        select.limit = Some(3);
        assert_eq!(
            compact(&SqlExpr::Select(Box::new(select))),
            "SELECT [u].* FROM [Users] AS [u] ORDER BY [u].[age] DESC OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY"
        );
    }

    #[test]
    fn test_alias_omitted_when_redundant() {
        let select = users_select().with_projections(vec![
            Projection::new(SqlExpr::column("u", "name"), Some("name".to_string())),
            Projection::new(SqlExpr::column("u", "age"), Some("Age".to_string())),
        ]);
        assert_eq!(
            compact(&SqlExpr::Select(Box::new(select))),
            "SELECT [u].[name], [u].[age] AS [Age] FROM [Users] AS [u]"
        );
    }

    #[test]
    fn test_json_subqueries() {
        let posts = Select::from_source(
            "s1".to_string(),
            SqlSource::Table(Table {
                name: "Posts".to_string(),
                alias: "p".to_string(),
            }),
        )
        .with_projections(vec![Projection::new(SqlExpr::column("p", "title"), None)])
        .with_predicate(SqlExpr::equals(
            SqlExpr::column("p", "authorId"),
            SqlExpr::column("u", "id"),
        ));

        let many = SqlExpr::ScalarSubqueryAsJson {
            select: Box::new(posts.clone()),
            mode: JsonMode::Path,
            include_nulls: true,
            without_array_wrapper: false,
        };
        assert_eq!(
            compact(&many),
            "JSON_QUERY(COALESCE((SELECT [p].[title] FROM [Posts] AS [p] WHERE [p].[authorId] = [u].[id] FOR JSON PATH, INCLUDE_NULL_VALUES), '[]'))"
        );

        let auto = SqlExpr::ScalarSubqueryAsJson {
            select: Box::new(posts.clone()),
            mode: JsonMode::Auto,
            include_nulls: false,
            without_array_wrapper: false,
        };
        assert_eq!(
            compact(&auto),
            "JSON_QUERY(COALESCE((SELECT [p].[title] FROM [Posts] AS [p] WHERE [p].[authorId] = [u].[id] FOR JSON AUTO), '[]'))"
        );

        let mut first = posts;
        first.limit = Some(1);
        first.orderings = vec![Ordering {
            expression: SqlExpr::column("p", "title"),
            direction: SortDirection::Ascending,
        }];
        let one = SqlExpr::ScalarSubqueryAsJson {
            select: Box::new(first),
            mode: JsonMode::Path,
            include_nulls: true,
            without_array_wrapper: true,
        };
        assert_eq!(
            compact(&one),
            "(SELECT [p].[title] FROM [Posts] AS [p] WHERE [p].[authorId] = [u].[id] ORDER BY [p].[title] OFFSET 0 ROWS FETCH NEXT 1 ROWS ONLY FOR JSON PATH, INCLUDE_NULL_VALUES, WITHOUT_ARRAY_WRAPPER)"
        );
    }

    #[test]
    fn test_exists_and_not_exists() {
        let reduced = users_select().with_projections(vec![Projection::new(SqlExpr::constant(1), None)]);
        let exists = SqlExpr::Exists(Box::new(reduced));
        assert_eq!(compact(&exists), "EXISTS (SELECT 1 FROM [Users] AS [u])");
        assert_eq!(
            compact(&SqlExpr::Not(Box::new(exists))),
            "NOT EXISTS (SELECT 1 FROM [Users] AS [u])"
        );
    }

    #[test]
    fn test_derived_table_and_union() {
        let inner = users_select();
        let outer = Select::from_source("s1".to_string(), SqlSource::Select(Box::new(inner.clone())));
        assert_eq!(
            compact(&SqlExpr::Select(Box::new(outer))),
            "SELECT [s].* FROM (SELECT [u].* FROM [Users] AS [u]) AS [s]"
        );

        let union = Union {
            sources: vec![inner.clone(), inner],
            alias: "u1".to_string(),
            distinct: false,
        };
        assert_eq!(
            compact(&SqlExpr::Union(union)),
            "SELECT [u].* FROM [Users] AS [u] UNION ALL SELECT [u].* FROM [Users] AS [u]"
        );
    }

    #[test]
    fn test_pretty_layout() {
        let inner = users_select().with_predicate(SqlExpr::binary(
            age(),
            SqlBinaryOp::GreaterThan,
            SqlExpr::constant(30),
        ));
        let outer = Select::from_source("s1".to_string(), SqlSource::Select(Box::new(inner)));
        let sql = SqlGenerator::new()
            .with_pretty_print(true)
            .with_indent_width(2)
            .generate(&SqlExpr::Select(Box::new(outer)))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT [s].*\nFROM (\n  SELECT [u].*\n  FROM [Users] AS [u]\n  WHERE [u].[age] > 30\n) AS [s]"
        );
    }

    #[test]
    fn test_structural_errors() {
        let mut orphan = users_select();
        orphan.from = None;
        let err = SqlGenerator::new()
            .generate(&SqlExpr::Select(Box::new(orphan)))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<GenerationError>(),
            Some(&GenerationError::MissingFrom("s".to_string()))
        );

        let nameless = Select::from_source(
            "s".to_string(),
            SqlSource::Table(Table {
                name: "Users".to_string(),
                alias: String::new(),
            }),
        );
        let err = SqlGenerator::new()
            .generate(&SqlExpr::Select(Box::new(nameless)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::MissingAlias(_))
        ));
    }
}
