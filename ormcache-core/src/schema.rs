//! The validated application schema handed to the Dependency Engine.
//!
//! These types describe the data only; parsing a schema source into an
//! `AppSchema` and validating it is the `ormcache-schema` crate's job, kept
//! separate so `ormcache-core` stays free of any file/IO concerns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSchema {
    pub version: u64,
    pub models: Vec<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub id: IdDescriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

/// A model's identity: either a single string-typed id or an ordered
/// composite key over several fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdDescriptor {
    String,
    Composite { fields: Vec<String> },
}

impl IdDescriptor {
    pub fn fields(&self) -> &[String] {
        match self {
            Self::String => &[],
            Self::Composite { fields } => fields,
        }
    }

    /// `true` for a composite id with no fields; a bare `String` id is never
    /// empty by construction.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Composite { fields } if fields.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub model: String,
    pub cardinality: Cardinality,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl AppSchema {
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_descriptor_reports_its_fields() {
        let id = IdDescriptor::Composite {
            fields: vec!["tenant_id".to_string(), "id".to_string()],
        };
        assert_eq!(id.fields(), &["tenant_id".to_string(), "id".to_string()]);
        assert!(!id.is_empty());
    }

    #[test]
    fn string_id_descriptor_is_never_empty() {
        assert!(!IdDescriptor::String.is_empty());
    }

    #[test]
    fn schema_looks_up_models_by_name() {
        let schema = AppSchema {
            version: 1,
            models: vec![Model {
                name: "User".to_string(),
                id: IdDescriptor::String,
                relations: vec![],
            }],
        };
        assert!(schema.model("User").is_some());
        assert!(schema.model("Missing").is_none());
    }

    #[test]
    fn id_descriptor_serializes_with_a_kind_tag() {
        let json = serde_json::to_value(IdDescriptor::String).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "string"}));

        let json = serde_json::to_value(IdDescriptor::Composite {
            fields: vec!["a".to_string()],
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"kind": "composite", "fields": ["a"]}));
    }

    #[test]
    fn relation_cardinality_serializes_kebab_case() {
        let relation = Relation {
            name: "posts".to_string(),
            model: "Post".to_string(),
            cardinality: Cardinality::OneToMany,
            foreign_key: Some("author_id".to_string()),
        };
        let json = serde_json::to_value(&relation).unwrap();
        assert_eq!(json["cardinality"], "one-to-many");
        assert_eq!(json["foreign_key"], "author_id");
    }
}
