//! # Schema Lint Subcommand
//!
//! Compiles a schema the way server startup would. A schema that fails
//! here would make `Server::build` fail.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use reqgate_schema::DefaultEngine;

use crate::{add_shared_schemas, load_document};

/// Arguments for the `reqgate schema-lint` subcommand.
#[derive(Args, Debug)]
pub struct LintArgs {
    /// Schema files to compile (JSON or YAML).
    #[arg(value_name = "FILE", required = true)]
    pub schemas: Vec<PathBuf>,

    /// Additional schemas, addressable by `$id` from `$ref`.
    #[arg(long = "shared", value_name = "FILE")]
    pub shared: Vec<PathBuf>,
}

/// Execute the schema-lint subcommand.
///
/// Returns exit code: 0 if every schema compiles, 1 otherwise.
pub fn run_lint(args: &LintArgs) -> Result<u8> {
    let mut engine = DefaultEngine::default();
    add_shared_schemas(&mut engine, &args.shared)?;

    let mut failed = 0usize;
    for path in &args.schemas {
        let schema = load_document(path)?;
        match engine.compile_schema(&schema) {
            Ok(_) => println!("  OK: {}", path.display()),
            Err(err) => {
                failed += 1;
                println!("  FAIL: {}: {err}", path.display());
            }
        }
    }

    println!(
        "Schemas: {}/{} compiled",
        args.schemas.len() - failed,
        args.schemas.len()
    );
    Ok(u8::from(failed > 0))
}
