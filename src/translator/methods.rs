// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! String and date helper methods called on scalar values.

use anyhow::{bail, Result};

use crate::query_ir::QueryExpr;
use crate::sql_ir::{LikePosition, SqlBinaryOp, SqlExpr};
use crate::value::Value;

use super::context::TranslationContext;
use super::errors::TranslationError;
use super::{static_eval, Translator};

pub(crate) fn date_part(name: &str) -> Option<&'static str> {
    Some(match name {
        "year" => "year",
        "month" => "month",
        "day" => "day",
        "hour" => "hour",
        "minute" => "minute",
        "second" => "second",
        _ => return None,
    })
}

/// `DATEPART(part, target)`; the generator prints `part` as a bare keyword.
pub(crate) fn datepart(part: &str, target: SqlExpr) -> SqlExpr {
    SqlExpr::function("DATEPART", vec![SqlExpr::constant(part), target])
}

fn check_args(method: &str, args: &[QueryExpr], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        bail!(TranslationError::Arity(format!(
            "`{}` takes {} argument(s), got {}",
            method,
            expected,
            args.len()
        )));
    }
    Ok(())
}

/// Lower `receiver.method(args)` when `method` is a scalar helper.
///
/// Returns `Ok(None)` for every other method so operator dispatch can run.
pub(crate) fn translate_instance_call(
    tr: &mut Translator,
    receiver: &QueryExpr,
    method: &str,
    args: &[QueryExpr],
    ctx: &TranslationContext,
) -> Result<Option<SqlExpr>> {
    let function = match method {
        "toUpperCase" | "upper" => Some("UPPER"),
        "toLowerCase" | "lower" => Some("LOWER"),
        "trim" => Some("TRIM"),
        _ => None,
    };
    if let Some(function) = function {
        check_args(method, args, 0, 0)?;
        let target = scalar(tr, receiver, ctx)?;
        return Ok(Some(SqlExpr::function(function, vec![target])));
    }

    if let Some(part) = date_part(method) {
        check_args(method, args, 0, 0)?;
        let target = scalar(tr, receiver, ctx)?;
        return Ok(Some(datepart(part, target)));
    }

    let expr = match method {
        "startsWith" => like(tr, receiver, method, args, LikePosition::StartsWith, ctx)?,
        "endsWith" => like(tr, receiver, method, args, LikePosition::EndsWith, ctx)?,
        "includes" | "contains" => match static_eval(receiver, ctx) {
            Some(Value::Array(items)) => membership(tr, items, method, args, ctx)?,
            _ => like(tr, receiver, method, args, LikePosition::Contains, ctx)?,
        },
        "substring" => substring(tr, receiver, args, ctx)?,
        _ => return Ok(None),
    };
    Ok(Some(expr))
}

fn scalar(tr: &mut Translator, expr: &QueryExpr, ctx: &TranslationContext) -> Result<SqlExpr> {
    let value = tr.visit(expr, ctx)?;
    tr.as_scalar(value)
}

fn like(
    tr: &mut Translator,
    receiver: &QueryExpr,
    method: &str,
    args: &[QueryExpr],
    position: LikePosition,
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    check_args(method, args, 1, 1)?;
    let source = scalar(tr, receiver, ctx)?;
    let pattern = scalar(tr, &args[0], ctx)?;
    Ok(SqlExpr::Like {
        source: Box::new(source),
        pattern: Box::new(pattern),
        position,
    })
}

fn membership(
    tr: &mut Translator,
    items: Vec<Value>,
    method: &str,
    args: &[QueryExpr],
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    check_args(method, args, 1, 1)?;
    if items.is_empty() {
        bail!(TranslationError::InvalidLiteral(format!(
            "`{}` on an empty collection",
            method
        )));
    }
    let value = scalar(tr, &args[0], ctx)?;
    Ok(SqlExpr::In {
        value: Box::new(value),
        candidates: items.into_iter().map(SqlExpr::Constant).collect(),
    })
}

/// `substring(start[, length])` with a 0-based start.
fn substring(
    tr: &mut Translator,
    receiver: &QueryExpr,
    args: &[QueryExpr],
    ctx: &TranslationContext,
) -> Result<SqlExpr> {
    check_args("substring", args, 1, 2)?;
    let target = scalar(tr, receiver, ctx)?;

    let start = match static_eval(&args[0], ctx) {
        Some(Value::Int(start)) => SqlExpr::constant(start.saturating_add(1)),
        _ => {
            let start = scalar(tr, &args[0], ctx)?;
            SqlExpr::binary(start, SqlBinaryOp::Add, SqlExpr::constant(1))
        }
    };
    let length = match args.get(1) {
        Some(length) => scalar(tr, length, ctx)?,
        None => SqlExpr::function("LEN", vec![target.clone()]),
    };
    Ok(SqlExpr::function("SUBSTRING", vec![target, start, length]))
}
