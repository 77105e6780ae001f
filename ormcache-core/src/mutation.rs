//! The canonical, engine-recognised description of a write.

use crate::statement::FilterNode;
use serde::{Deserialize, Serialize};

/// An ordered sequence of changes to apply as a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub changes: Vec<Change>,
}

impl Mutation {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn single(change: Change) -> Self {
        Self {
            changes: vec![change],
        }
    }

    /// The set of models this mutation touches, in first-seen order.
    pub fn affected_models(&self) -> Vec<&str> {
        let mut models = Vec::new();
        for change in &self.changes {
            let model = change.model();
            if !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }
}

/// One change within a [`Mutation`]. Order matters: later changes in the
/// same mutation observe the effects of earlier ones.
///
/// `update`/`delete` may target rows by `ids`, by `filter`, by both, or by
/// neither (when the mapper couldn't resolve a precise target and is
/// relying on the engine's conservative invalidation instead). `link`/
/// `unlink` identify the source row by `ids` and the relation's target by
/// `target_model`/`target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Change {
    Insert {
        model: String,
        values: serde_json::Value,
    },
    Update {
        model: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ids: Option<Vec<serde_json::Value>>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        filter: Option<FilterNode>,
        values: serde_json::Value,
    },
    Delete {
        model: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ids: Option<Vec<serde_json::Value>>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        filter: Option<FilterNode>,
    },
    Link {
        model: String,
        relation: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ids: Option<Vec<serde_json::Value>>,
        target_model: String,
        target_id: serde_json::Value,
    },
    Unlink {
        model: String,
        relation: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ids: Option<Vec<serde_json::Value>>,
        target_model: String,
        target_id: serde_json::Value,
    },
}

impl Change {
    pub fn model(&self) -> &str {
        match self {
            Self::Insert { model, .. }
            | Self::Update { model, .. }
            | Self::Delete { model, .. }
            | Self::Link { model, .. }
            | Self::Unlink { model, .. } => model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affected_models_dedupes_and_preserves_order() {
        let mutation = Mutation::new(vec![
            Change::Insert {
                model: "Post".to_string(),
                values: serde_json::json!({"title": "a"}),
            },
            Change::Update {
                model: "User".to_string(),
                ids: None,
                filter: None,
                values: serde_json::json!({"active": true}),
            },
            Change::Delete {
                model: "Post".to_string(),
                ids: None,
                filter: None,
            },
        ]);
        assert_eq!(mutation.affected_models(), vec!["Post", "User"]);
    }

    #[test]
    fn mutation_serializes_tagged_changes() {
        let mutation = Mutation::single(Change::Link {
            model: "User".to_string(),
            relation: "teams".to_string(),
            ids: Some(vec![serde_json::json!("u1")]),
            target_model: "Team".to_string(),
            target_id: serde_json::json!("t1"),
        });
        let json = serde_json::to_value(&mutation).unwrap();
        assert_eq!(json["changes"][0]["op"], "link");
        assert_eq!(json["changes"][0]["target_model"], "Team");
    }

    #[test]
    fn update_may_target_rows_by_id_without_a_filter() {
        let change = Change::Update {
            model: "User".to_string(),
            ids: Some(vec![serde_json::json!("u1")]),
            filter: None,
            values: serde_json::json!({"active": false}),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["ids"], serde_json::json!(["u1"]));
        assert!(json.get("filter").is_none());
    }
}
