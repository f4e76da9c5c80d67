//! Definition Linting
//!
//! Checks schema definitions for problems the registry builder does not
//! reject outright but that break lookups or cascades later.
//!
//! ## Lints
//! - `L001` field name is not a plain identifier (dotted names collide with
//!   embedded-id paths such as `author._id`)
//! - `L002` relation field named `_id`
//! - `L003` (warning) schema declares no pure fields
//! - `L004` (warning) schema owns the same target through several main relations

use regex::Regex;
use std::collections::HashMap;

use crate::schema::Schema;
use crate::store::ID_FIELD;

/// Result of linting a schema
#[derive(Debug, Default)]
pub struct LintResult {
    pub schema: String,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug)]
pub struct LintError {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

#[derive(Debug)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

/// The definition linter
pub struct DefinitionLinter {
    identifier: Regex,
}

impl Default for DefinitionLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionLinter {
    pub fn new() -> Self {
        Self {
            identifier: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap(),
        }
    }

    /// Lint one schema definition
    pub fn lint(&self, schema: &Schema) -> LintResult {
        let mut result = LintResult {
            schema: schema.name.clone(),
            ..Default::default()
        };

        for name in schema.pure_fields.keys() {
            self.check_identifier(name, &format!("{}.pure_fields", schema.name), &mut result);
        }

        let relations = schema.relations();
        let groups = [
            ("in_relations", relations.in_relations),
            ("out_relations", relations.out_relations),
            ("main_relations", relations.main_relations),
        ];
        for (group, map) in groups {
            let path = format!("{}.{}", schema.name, group);
            for name in map.keys() {
                self.check_identifier(name, &path, &mut result);
                if name == ID_FIELD {
                    result.errors.push(LintError {
                        code: "L002",
                        message: format!("Relation field may not be named '{}'", ID_FIELD),
                        path: format!("{}.{}", path, name),
                    });
                }
            }
        }

        if schema.pure_fields.is_empty() {
            result.warnings.push(LintWarning {
                code: "L003",
                message: "Schema declares no pure fields".to_string(),
                path: schema.name.clone(),
            });
        }

        let mut by_target: HashMap<&str, Vec<&str>> = HashMap::new();
        for (field, relation) in relations.main_relations {
            by_target
                .entry(relation.schema_name.as_str())
                .or_default()
                .push(field.as_str());
        }
        let mut targets: Vec<_> = by_target.into_iter().filter(|(_, f)| f.len() > 1).collect();
        targets.sort();
        for (target, fields) in targets {
            result.warnings.push(LintWarning {
                code: "L004",
                message: format!(
                    "'{}' is owned through several main relations ({}); each is checked and cascaded separately",
                    target,
                    fields.join(", ")
                ),
                path: format!("{}.main_relations", schema.name),
            });
        }

        result
    }

    fn check_identifier(&self, name: &str, path: &str, result: &mut LintResult) {
        if !self.identifier.is_match(name) {
            result.errors.push(LintError {
                code: "L001",
                message: format!("Field name '{}' is not a plain identifier", name),
                path: format!("{}.{}", path, name),
            });
        }
    }
}

/// Lint every schema, keeping only results with findings
pub fn lint_schemas<'a>(schemas: impl IntoIterator<Item = &'a Schema>) -> Vec<LintResult> {
    let linter = DefinitionLinter::new();
    schemas
        .into_iter()
        .map(|schema| linter.lint(schema))
        .filter(|result| !result.is_clean() || result.has_warnings())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, RelationDef};

    #[test]
    fn test_clean_schema() {
        let schema = Schema::new("post")
            .with_pure("title", FieldKind::String)
            .with_main_relation("author", RelationDef::single("user"));
        let result = DefinitionLinter::new().lint(&schema);
        assert!(result.is_clean());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_dotted_field_name() {
        let schema = Schema::new("post").with_pure("meta.title", FieldKind::String);
        let result = DefinitionLinter::new().lint(&schema);
        assert!(result.errors.iter().any(|e| e.code == "L001" && e.path == "post.pure_fields.meta.title"));
    }

    #[test]
    fn test_relation_named_id() {
        let schema = Schema::new("post")
            .with_pure("title", FieldKind::String)
            .with_out_relation("_id", RelationDef::single("user"));
        let result = DefinitionLinter::new().lint(&schema);
        assert!(result.errors.iter().any(|e| e.code == "L002"));
    }

    #[test]
    fn test_warnings() {
        let schema = Schema::new("review")
            .with_main_relation("writer", RelationDef::single("user"))
            .with_main_relation("editor", RelationDef::single("user"));
        let result = DefinitionLinter::new().lint(&schema);
        assert!(result.is_clean());
        assert!(result.warnings.iter().any(|w| w.code == "L003"));
        let duplicate = result.warnings.iter().find(|w| w.code == "L004").unwrap();
        assert!(duplicate.message.contains("writer, editor"));
    }

    #[test]
    fn test_lint_schemas_filters_clean() {
        let clean = Schema::new("user").with_pure("name", FieldKind::String);
        let empty = Schema::new("tag");
        let results = lint_schemas([&clean, &empty]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].schema, "tag");
    }
}
