//! # reqgate-cli — Command-Line Tool
//!
//! Offline access to the default schema engine, so schemas and sample
//! bodies can be checked before a server is deployed with them.
//!
//! ## Subcommands
//!
//! - `reqgate check --schema <FILE> --body <FILE>` — validate a body and
//!   print the accepted (coerced, stripped) value or the violations.
//! - `reqgate schema-lint <FILE>` — compile a schema and report whether the
//!   server would accept it at startup.
//!
//! Files may be JSON or YAML, chosen by extension (`.yaml`/`.yml` is YAML,
//! anything else JSON).
//!
//! Exit codes: 0 success, 1 validation or lint failure, 2 operational error.

pub mod check;
pub mod lint;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqgate_schema::DefaultEngine;
use serde_json::Value;

/// Read a JSON or YAML document into a JSON value.
pub fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON in {}", path.display()))
    }
}

/// Register every file in `shared` on `engine` as a shared schema.
pub fn add_shared_schemas(engine: &mut DefaultEngine, shared: &[PathBuf]) -> Result<()> {
    for path in shared {
        let schema = load_document(path)?;
        engine
            .add_schema(schema)
            .with_context(|| format!("cannot register shared schema {}", path.display()))?;
        tracing::debug!(path = %path.display(), "registered shared schema");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("schema.json");
        let yaml_path = dir.path().join("schema.YML");
        std::fs::write(&json_path, r#"{"type": "integer"}"#).unwrap();
        std::fs::write(&yaml_path, "type: integer\n").unwrap();
        assert_eq!(load_document(&json_path).unwrap(), json!({"type": "integer"}));
        assert_eq!(load_document(&yaml_path).unwrap(), json!({"type": "integer"}));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_document(Path::new("/nonexistent/reqgate/body.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[test]
    fn shared_schema_without_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        std::fs::write(&path, r#"{"type": "object"}"#).unwrap();
        let mut engine = DefaultEngine::default();
        assert!(add_shared_schemas(&mut engine, &[path]).is_err());
    }
}
