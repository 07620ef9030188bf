//! # Check Subcommand
//!
//! Runs one body through the default engine exactly as a server route
//! would: normalization first, then keyword checks.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use reqgate_core::{invoke, CompiledValidator, ValidationErrorDetail, ValidationOutcome};
use reqgate_schema::{DefaultEngine, EngineOptions};

use crate::{add_shared_schemas, load_document};

/// Arguments for the `reqgate check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema file (JSON or YAML).
    #[arg(long)]
    pub schema: PathBuf,

    /// Body file (JSON or YAML).
    #[arg(long)]
    pub body: PathBuf,

    /// Additional schemas, addressable by `$id` from `$ref`.
    #[arg(long = "shared", value_name = "FILE")]
    pub shared: Vec<PathBuf>,

    /// Do not coerce scalars to the declared type.
    #[arg(long)]
    pub no_coerce: bool,

    /// Keep properties not allowed by `additionalProperties: false`.
    #[arg(long)]
    pub keep_additional: bool,

    /// Report every violation instead of only the first.
    #[arg(long)]
    pub all_errors: bool,
}

impl CheckArgs {
    /// Engine options selected by the flags.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            coerce_types: !self.no_coerce,
            remove_additional: !self.keep_additional,
            all_errors: self.all_errors,
        }
    }
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 if the body is accepted, 1 if rejected. Unreadable
/// files and uncompilable schemas are errors.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let schema = load_document(&args.schema)?;
    let body = load_document(&args.body)?;

    let mut engine = DefaultEngine::new(args.engine_options());
    add_shared_schemas(&mut engine, &args.shared)?;
    let compiled = engine
        .compile_schema(&schema)
        .with_context(|| format!("schema {} does not compile", args.schema.display()))?;

    let validator = CompiledValidator::from_fn(move |body| compiled.validate(body));
    match invoke(&validator, &body) {
        ValidationOutcome::Accepted(accepted) => {
            println!("{}", serde_json::to_string_pretty(&accepted)?);
            Ok(0)
        }
        ValidationOutcome::Rejected(detail) => {
            print_rejection(&detail);
            Ok(1)
        }
    }
}

fn print_rejection(detail: &ValidationErrorDetail) {
    match detail {
        ValidationErrorDetail::Violations(records) => {
            for record in records {
                let at = if record.path.is_empty() { "<body>" } else { &record.path };
                println!(
                    "  FAIL: {at} [{}] {} ({})",
                    record.keyword, record.message, record.schema_path
                );
            }
            println!("\n{} violation(s).", records.len());
        }
        ValidationErrorDetail::Message(message) => println!("  FAIL: {message}"),
    }
}
