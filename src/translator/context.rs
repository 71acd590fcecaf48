// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parameter-to-source environment threaded through nested lambdas.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::query_ir::{Param, ParamId, QueryExpr};
use crate::sql_ir::{Projection, Select, SqlExpr, SqlSource, Table, Union};

use super::errors::TranslationError;

/// One part of a captured group key. `name` is `None` for a single, unnamed key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPart {
    pub name: Option<String>,
    pub expression: SqlExpr,
}

/// What a lambda parameter stands for while its body is visited.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Table(Table),
    /// The select under construction; members inline its projections.
    Select(Box<Select>),
    /// A select used as a FROM/JOIN source; members address its alias.
    Subquery(Box<Select>),
    Union(Union),
    /// The `key` placeholder of a group-by result selector.
    GroupKey(Vec<KeyPart>),
    /// The `group` placeholder; aggregates re-resolve against the pre-group source.
    Group(Box<DataSource>),
}

impl DataSource {
    pub fn from_sql_source(source: &SqlSource) -> Self {
        match source {
            SqlSource::Table(table) => DataSource::Table(table.clone()),
            SqlSource::Select(select) => DataSource::Subquery(select.clone()),
            SqlSource::Union(union) => DataSource::Union(union.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataSource::Table(_) => "table",
            DataSource::Select(_) => "select",
            DataSource::Subquery(_) => "subquery",
            DataSource::Union(_) => "union",
            DataSource::GroupKey(_) => "group key",
            DataSource::Group(_) => "group",
        }
    }

    /// Looks up a (possibly dotted) member name on this source.
    pub fn lookup(&self, name: &str) -> Option<SqlExpr> {
        match self {
            DataSource::Table(table) => {
                (!name.contains('.')).then(|| SqlExpr::column(&table.alias, name))
            }
            DataSource::Subquery(select) => {
                exposes(&select.projections, name).then(|| SqlExpr::column(&select.alias, name))
            }
            DataSource::Union(union) => {
                let exposed = union
                    .sources
                    .first()
                    .map_or(false, |first| exposes(&first.projections, name));
                exposed.then(|| SqlExpr::column(&union.alias, name))
            }
            DataSource::Select(select) => {
                if let Some(projection) = select
                    .projections
                    .iter()
                    .find(|p| p.output_name() == Some(name))
                {
                    return Some(projection.expression.clone());
                }
                if select.projections.is_empty() {
                    return select
                        .from
                        .as_ref()
                        .and_then(|from| DataSource::from_sql_source(from).lookup(name));
                }
                // A select over `[u].*` still exposes the columns of `u`.
                select.projections.iter().find_map(|p| match &p.expression {
                    SqlExpr::Column(column) if column.is_wildcard() && !name.contains('.') => {
                        Some(SqlExpr::column(&column.table, name))
                    }
                    _ => None,
                })
            }
            DataSource::GroupKey(parts) => parts
                .iter()
                .find(|part| part.name.as_deref() == Some(name))
                .map(|part| part.expression.clone()),
            DataSource::Group(_) => None,
        }
    }
}

fn exposes(projections: &[Projection], name: &str) -> bool {
    projections.iter().any(|p| p.output_name() == Some(name))
        || (!name.contains('.')
            && (projections.is_empty()
                || projections.iter().any(|p| {
                    matches!(&p.expression, SqlExpr::Column(column) if column.is_wildcard())
                })))
}

/// Parent-linked environment of lambda parameter bindings.
///
/// A child borrows its parent and never mutates it; lookups walk outward
/// until a binding is found.
#[derive(Debug, Default)]
pub struct TranslationContext<'a> {
    bindings: Vec<(ParamId, DataSource)>,
    externals: BTreeMap<String, QueryExpr>,
    parent: Option<&'a TranslationContext<'a>>,
}

impl<'a> TranslationContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, param: &Param, source: DataSource) {
        self.bindings.push((param.id, source));
    }

    pub fn resolve(&self, param: &Param) -> Option<&DataSource> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some((_, source)) = ctx.bindings.iter().rev().find(|(id, _)| *id == param.id) {
                return Some(source);
            }
            current = ctx.parent;
        }
        None
    }

    pub fn resolve_strict(&self, param: &Param) -> Result<&DataSource> {
        match self.resolve(param) {
            Some(source) => Ok(source),
            None => bail!(TranslationError::UnresolvedParameter(param.name.clone())),
        }
    }

    /// Creates a child binding each parameter to the source at the same position.
    pub fn create_child(
        &self,
        params: &[Param],
        sources: Vec<DataSource>,
    ) -> Result<TranslationContext<'_>> {
        if params.len() != sources.len() {
            bail!(TranslationError::Arity(format!(
                "lambda takes {} parameter(s) but {} source(s) are available",
                params.len(),
                sources.len()
            )));
        }
        Ok(TranslationContext {
            bindings: params.iter().map(|p| p.id).zip(sources).collect(),
            externals: BTreeMap::new(),
            parent: Some(self),
        })
    }

    /// Creates a child that makes `bindings` visible to free variables by name.
    pub fn with_externals(&self, bindings: &BTreeMap<String, QueryExpr>) -> TranslationContext<'_> {
        TranslationContext {
            bindings: Vec::new(),
            externals: bindings.clone(),
            parent: Some(self),
        }
    }

    /// Nearest `Scope` binding for `name`.
    pub fn resolve_external(&self, name: &str) -> Option<&QueryExpr> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(expr) = ctx.externals.get(name) {
                return Some(expr);
            }
            current = ctx.parent;
        }
        None
    }

    /// True when no lambda parameter is bound anywhere in the chain.
    pub fn is_root(&self) -> bool {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if !ctx.bindings.is_empty() {
                return false;
            }
            current = ctx.parent;
        }
        true
    }
}
