//! Loads and validates the [`AppSchema`] handed to the Dependency Engine.
//!
//! Parsing accepts either JSON or YAML source (sniffed by leading
//! whitespace/brace), matching the common "either is fine" convention for
//! config-shaped files. `version` being numeric and every model declaring a
//! name and id are enforced by `AppSchema`'s own shape -- a source that
//! violates either fails to deserialize at all. Validation on top of that
//! only checks what the type system can't: at least one model is declared,
//! and a composite id names at least one field.

use ormcache_core::{AppSchema, IdDescriptor, SchemaError};
use std::path::Path;

/// Parse and validate schema source text.
pub fn parse(source: &str) -> Result<AppSchema, SchemaError> {
    let schema = decode(source)?;
    validate(&schema)?;
    Ok(schema)
}

/// Read, parse, and validate a schema file from disk.
pub fn load_file(path: impl AsRef<Path>) -> Result<AppSchema, SchemaError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|err| SchemaError::ReadFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    parse(&source)
}

fn decode(source: &str) -> Result<AppSchema, SchemaError> {
    let trimmed = source.trim_start();
    let looks_like_json = trimmed.starts_with('{');
    if looks_like_json {
        serde_json::from_str(source).map_err(|err| SchemaError::ParseFailed {
            reason: err.to_string(),
        })
    } else {
        serde_yaml::from_str(source).map_err(|err| SchemaError::ParseFailed {
            reason: err.to_string(),
        })
    }
}

/// Validate an already-parsed [`AppSchema`] against the invariants the
/// coordinator and engine both rely on.
pub fn validate(schema: &AppSchema) -> Result<(), SchemaError> {
    if schema.models.is_empty() {
        return Err(SchemaError::NoModels);
    }
    for (index, model) in schema.models.iter().enumerate() {
        if model.name.trim().is_empty() {
            return Err(SchemaError::MissingModelName { index });
        }
        if let IdDescriptor::Composite { .. } = &model.id {
            if model.id.is_empty() {
                return Err(SchemaError::EmptyCompositeId {
                    model: model.name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_schema_with_no_models() {
        let err = parse(r#"{"version": 1, "models": []}"#).unwrap_err();
        assert_eq!(err, SchemaError::NoModels);
    }

    #[test]
    fn rejects_non_numeric_version() {
        let err = parse(r#"{"version": "1", "models": []}"#).unwrap_err();
        assert!(matches!(err, SchemaError::ParseFailed { .. }));
    }

    #[test]
    fn rejects_model_with_empty_composite_id() {
        let err = parse(
            r#"{"version": 1, "models": [{"name": "User", "id": {"kind": "composite", "fields": []}}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::EmptyCompositeId {
                model: "User".to_string()
            }
        );
    }

    #[test]
    fn accepts_a_well_formed_schema() {
        let schema = parse(
            r#"{"version": 1, "models": [{"name": "User", "id": {"kind": "string"}, "relations": []}]}"#,
        )
        .unwrap();
        assert_eq!(schema.models.len(), 1);
    }

    #[test]
    fn accepts_a_model_with_relations() {
        let schema = parse(
            r#"{"version": 1, "models": [
                {"name": "User", "id": {"kind": "string"}, "relations": [
                    {"name": "posts", "model": "Post", "cardinality": "one-to-many", "foreign_key": "author_id"}
                ]}
            ]}"#,
        )
        .unwrap();
        let user = schema.model("User").unwrap();
        assert_eq!(user.relations[0].name, "posts");
    }

    #[test]
    fn accepts_yaml_source() {
        let schema = parse("version: 1\nmodels:\n  - name: User\n    id:\n      kind: string\n")
            .unwrap();
        assert_eq!(schema.model("User").unwrap().name, "User");
    }
}
