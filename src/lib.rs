// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Translate fluent query-expression trees into SQL Server SQL.
//!
//! The pipeline has two independent halves:
//!
//! * [`translator::Translator`] lowers a [`query_ir::QueryExpr`] into the
//!   [`sql_ir::SqlExpr`] tree.
//! * [`sql_codegen::SqlGenerator`] renders that tree as SQL Server text.
//!
//! [`QueryCompiler`] runs both with one [`config::TranslatorConfig`] and hands
//! back the text together with any [`diagnostics::Diagnostic`] raised on the way.

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod query_ir;
pub mod sql_codegen;
pub mod sql_ir;
pub mod tracing_utils;
pub mod translator;
pub mod value;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

pub use builder::{lambda, lambda2, Expr, Query};
pub use config::TranslatorConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use query_ir::{Param, QueryExpr};
pub use sql_codegen::{GenerationError, SqlGenerator};
pub use sql_ir::SqlExpr;
pub use translator::{TranslationError, Translator};
pub use value::Value;

/// Lower a query expression to SQL IR with the default configuration.
pub fn translate(expr: &QueryExpr) -> Result<SqlExpr> {
    Translator::new().translate(expr)
}

/// Render SQL IR as compact SQL Server text.
pub fn generate(expr: &SqlExpr) -> Result<String> {
    SqlGenerator::new().generate(expr)
}

/// Translate and render in one step.
///
/// Failures are annotated with the textual form of `expr`; the typed cause is
/// still reachable with `downcast_ref`.
pub fn get_query_text(expr: &QueryExpr) -> Result<String> {
    let sql = translate(expr).with_context(|| format!("failed to translate `{}`", expr))?;
    generate(&sql).with_context(|| format!("failed to generate SQL for `{}`", expr))
}

/// SQL text plus the non-fatal notices raised while producing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Translator and generator sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    config: TranslatorConfig,
}

impl QueryCompiler {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn compile(&self, expr: &QueryExpr) -> Result<CompiledQuery> {
        let mut translator = Translator::with_config(self.config.clone());
        let sql_ir = translator
            .translate(expr)
            .with_context(|| format!("failed to translate `{}`", expr))?;

        let mut generator = SqlGenerator::from_config(&self.config);
        let sql = generator
            .generate(&sql_ir)
            .with_context(|| format!("failed to generate SQL for `{}`", expr))?;
        let diagnostics = generator.take_diagnostics();
        debug!(
            "compiled query into {} bytes of SQL with {} diagnostic(s)",
            sql.len(),
            diagnostics.len()
        );

        Ok(CompiledQuery { sql, diagnostics })
    }
}
