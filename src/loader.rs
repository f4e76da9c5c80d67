//! Definition loading
//!
//! Reads schema definitions from `.json` and `.toml` files. A file holds
//! either a single schema or a `schemas` list:
//!
//! ```json
//! { "name": "post", "pure_fields": { "title": { "type": "string" } },
//!   "main_relations": { "author": { "schema_name": "user" } } }
//! ```
//!
//! Files are visited sorted by name, so the resulting registry order (and with
//! it owner lookup order) does not depend on the filesystem.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checksum::Checksum;
use crate::error::{OdmError, Result};
use crate::lint::DefinitionLinter;
use crate::registry::SchemaRegistry;
use crate::schema::Schema;

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Relative path prefixes to skip
    pub skip_prefixes: Vec<String>,
    /// Lint errors abort the load
    pub strict: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: Vec::new(),
            strict: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many { schemas: Vec<Schema> },
    One(Schema),
}

impl DefinitionFile {
    fn into_schemas(self) -> Vec<Schema> {
        match self {
            DefinitionFile::Many { schemas } => schemas,
            DefinitionFile::One(schema) => vec![schema],
        }
    }
}

/// Load a registry from a definition file or a directory of them
pub fn load_from_path(path: &Path, config: &LoadConfig) -> Result<SchemaRegistry> {
    if path.is_file() {
        let content = std::fs::read_to_string(path)?;
        let schemas = parse_definitions(path, &content)?;
        build(schemas, Checksum::from_bytes(content.as_bytes()), config)
    } else {
        load_from_directory(path, config)
    }
}

/// Load a registry from a single definition file
pub fn load_from_file(path: &Path) -> Result<SchemaRegistry> {
    load_from_path(path, &LoadConfig::default())
}

/// Load every definition file under `dir`
pub fn load_from_directory(dir: &Path, config: &LoadConfig) -> Result<SchemaRegistry> {
    if !dir.is_dir() {
        return Err(OdmError::InvalidDefinition {
            source_name: dir.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut schemas = Vec::new();
    let mut contents = Vec::new();

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if !is_definition_file(path) {
            continue;
        }

        let relative = path
            .strip_prefix(dir)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());
        if config.skip_prefixes.iter().any(|p| relative.starts_with(p.as_str())) {
            debug!(file = %relative, "skipping definition file");
            continue;
        }

        let content = std::fs::read_to_string(path)?;
        let parsed = parse_definitions(path, &content)?;
        debug!(file = %relative, schemas = parsed.len(), "loaded definitions");
        schemas.extend(parsed);
        contents.push(content);
    }

    let fingerprint = Checksum::from_chunks(contents.iter().map(|c| c.as_bytes()));
    build(schemas, fingerprint, config)
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("toml")
    )
}

fn parse_definitions(path: &Path, content: &str) -> Result<Vec<Schema>> {
    let file: DefinitionFile = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content)?,
        _ => serde_json::from_str(content)?,
    };
    let schemas = file.into_schemas();
    if schemas.is_empty() {
        return Err(OdmError::InvalidDefinition {
            source_name: path.display().to_string(),
            reason: "no schemas defined".to_string(),
        });
    }
    Ok(schemas)
}

fn build(schemas: Vec<Schema>, fingerprint: Checksum, config: &LoadConfig) -> Result<SchemaRegistry> {
    let linter = DefinitionLinter::new();
    for schema in &schemas {
        let result = linter.lint(schema);
        for warning in &result.warnings {
            debug!(code = warning.code, path = %warning.path, "{}", warning.message);
        }
        if let Some(error) = result.errors.first() {
            if config.strict {
                return Err(OdmError::InvalidDefinition {
                    source_name: schema.name.clone(),
                    reason: format!("{} at {}: {}", error.code, error.path, error.message),
                });
            }
            for error in &result.errors {
                warn!(code = error.code, path = %error.path, "{}", error.message);
            }
        }
    }

    schemas
        .into_iter()
        .fold(SchemaRegistry::builder(), |builder, schema| builder.schema(schema))
        .fingerprint(fingerprint)
        .build()
}
