// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Non-fatal notices raised while translating or generating a query.
//!
//! Every notice is emitted as a `tracing` warning when it is recorded and also
//! kept in the [`Diagnostics`] list so callers can inspect it afterwards.

use core::fmt;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// OFFSET/FETCH was requested without an ordering; `ORDER BY (SELECT NULL)` was synthesized.
    MissingOrderBy { select_alias: String },
    /// A SELECT was rendered with `*` because no projection was given.
    ImplicitWildcard { source_alias: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingOrderBy { select_alias } => write!(
                f,
                "paging on select `{}` has no ORDER BY; row order is not deterministic",
                select_alias
            ),
            Diagnostic::ImplicitWildcard { source_alias } => write!(
                f,
                "select over `{}` has no projection; all columns are returned",
                source_alias
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!(target: "lambda_sql::diagnostics", "{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.entries)
    }

    pub fn has_missing_order_by(&self) -> bool {
        self.entries
            .iter()
            .any(|d| matches!(d, Diagnostic::MissingOrderBy { .. }))
    }
}
