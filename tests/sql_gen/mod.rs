// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! YAML-based tests for SQL generation
//!
//! Each case holds a query expression in its serialized form, an optional
//! configuration and either the expected SQL text or a fragment of the
//! expected error.

use anyhow::{bail, Result};
use lambda_sql::{QueryCompiler, QueryExpr, TranslatorConfig};
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct SqlTestCase {
    note: String,
    /// Serialized `QueryExpr`
    query: serde_json::Value,
    config: Option<TranslatorConfig>,
    sql: Option<String>,
    /// Fragment of the expected error chain
    error: Option<String>,
    /// Number of diagnostics the generator should report
    diagnostics: Option<usize>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct SqlYamlTest {
    cases: Vec<SqlTestCase>,
}

fn sql_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml_str = std::fs::read_to_string(file)?;
    let test: SqlYamlTest = serde_yaml::from_str(&yaml_str)?;

    for case in &test.cases {
        print!("\ncase {} ", case.note);

        let query: QueryExpr = serde_json::from_value(case.query.clone())?;
        let compiler = QueryCompiler::new(case.config.clone().unwrap_or_default());

        match compiler.compile(&query) {
            Ok(compiled) => {
                if let Some(expected_error) = &case.error {
                    bail!(
                        "Expected error `{}` but compilation produced:\n{}",
                        expected_error,
                        compiled.sql
                    );
                }

                if let Some(expected_sql) = &case.sql {
                    let expected_sql = expected_sql.trim_end();
                    if compiled.sql != expected_sql {
                        println!(
                            "DIFF {}",
                            prettydiff::diff_chars(expected_sql, &compiled.sql)
                        );
                        bail!(
                            "SQL mismatch:\nExpected:\n{}\n\nActual:\n{}",
                            expected_sql,
                            compiled.sql
                        );
                    }
                }

                if let Some(expected) = case.diagnostics {
                    if compiled.diagnostics.len() != expected {
                        bail!(
                            "Expected {} diagnostic(s), got {:?}",
                            expected,
                            compiled.diagnostics
                        );
                    }
                }

                println!("passed");
            }
            Err(err) => {
                let error_str = format!("{:#}", err);
                match &case.error {
                    Some(expected_error) if error_str.contains(expected_error.as_str()) => {
                        println!("passed (expected error)");
                    }
                    Some(expected_error) => bail!(
                        "Error `{}` does not contain expected `{}`",
                        error_str,
                        expected_error
                    ),
                    None => bail!("Unexpected error: {}", error_str),
                }
            }
        }
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn sql_test(file: &str) -> Result<()> {
    match sql_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // An Err is not always printed by cargo test, so panic with it.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/sql_gen/**/*.yaml")]
fn run_sql_tests(path: &str) {
    sql_test(path).unwrap()
}
