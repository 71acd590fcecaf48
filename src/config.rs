// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Translator and generator settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sql_ir::JsonMode;

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_scalar_alias() -> String {
    "value".to_string()
}

fn default_first_alias() -> String {
    "__first".to_string()
}

fn default_single_alias() -> String {
    "__single".to_string()
}

fn default_true() -> bool {
    true
}

fn default_indent_width() -> usize {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorConfig {
    /// Column compared against NULL when a whole row is tested for null.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Alias given to a single computed (non-column) projection.
    #[serde(default = "default_scalar_alias")]
    pub scalar_alias: String,
    /// Result alias marking the output of `first`/`firstOrDefault`.
    #[serde(default = "default_first_alias")]
    pub first_alias: String,
    /// Result alias marking the output of `single`/`singleOrDefault`.
    #[serde(default = "default_single_alias")]
    pub single_alias: String,
    /// Add `INCLUDE_NULL_VALUES` to `FOR JSON` subqueries.
    #[serde(default = "default_true")]
    pub json_include_nulls: bool,
    /// `FOR JSON` flavor used for nested collections.
    #[serde(default)]
    pub json_mode: JsonMode,
    #[serde(default)]
    pub pretty_print: bool,
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            scalar_alias: default_scalar_alias(),
            first_alias: default_first_alias(),
            single_alias: default_single_alias(),
            json_include_nulls: true,
            json_mode: JsonMode::Path,
            pretty_print: false,
            indent_width: default_indent_width(),
        }
    }
}

impl TranslatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid translator configuration")
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid translator configuration")
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    pub fn with_json_include_nulls(mut self, include: bool) -> Self {
        self.json_include_nulls = include;
        self
    }

    pub fn with_json_mode(mut self, mode: JsonMode) -> Self {
        self.json_mode = mode;
        self
    }
}
