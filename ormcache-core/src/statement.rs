//! The canonical, engine-recognised description of a read.
//!
//! A [`Statement`] is a value object: two statements with equal normalized
//! content map to equal [`crate::ShapeId`]s. The coordinator never builds a
//! `Statement` itself -- the ORM Mapper does -- but it owns the type so both
//! sides of that boundary agree on its shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single read statement against one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// The target model name, as declared in the `AppSchema`.
    pub model: String,
    /// An ordered set of fields to project, or `None` for "all fields".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub projection: Option<Vec<String>>,
    /// The filter tree, or `None` for "no filter".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<FilterNode>,
    /// Ordered sort keys.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sort: Option<Vec<SortKey>>,
    /// Pagination window.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pagination: Option<Pagination>,
    /// Nested relation inclusions; each inclusion carries its own statement shape.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub include: Option<Vec<Inclusion>>,
    /// Fields the result set must be distinct on.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distinct: Option<Vec<String>>,
    /// Grouping clause.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<Grouping>,
}

impl Statement {
    /// Construct the simplest possible statement: a bare model read with no
    /// projection, filter, sort, pagination, inclusions, distinct, or grouping.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            projection: None,
            filter: None,
            sort: None,
            pagination: None,
            include: None,
            distinct: None,
            group: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_projection(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_include(mut self, include: Vec<Inclusion>) -> Self {
        self.include = Some(include);
        self
    }
}

/// A nested relation inclusion. Shares the same shape as a top-level
/// statement so inclusions can recurse arbitrarily deep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    /// The relation name, as declared on the parent model's schema.
    pub relation: String,
    #[serde(flatten)]
    pub statement: Statement,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A limit/offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub offset: Option<u64>,
}

/// A grouping clause: group by `fields`, optionally filtering groups with `having`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub having: Option<FilterNode>,
}

/// A boolean filter tree: AND/OR/NOT combinators over leaf conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Leaf(FilterCondition),
}

impl FilterNode {
    pub fn leaf(condition: FilterCondition) -> Self {
        Self::Leaf(condition)
    }

    pub fn and(nodes: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::And(nodes.into_iter().collect())
    }

    pub fn or(nodes: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::Or(nodes.into_iter().collect())
    }

    pub fn not(node: FilterNode) -> Self {
        Self::Not(Box::new(node))
    }
}

/// A single leaf condition: a field (optionally a nested path within it),
/// an operator, and a comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    /// A dotted path into a JSON/composite field, e.g. `"address.city"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            path: None,
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A filter operator.
///
/// `Unsupported` and `Unknown` are the mapper's escape hatches: an operator
/// the mapper cannot precisely represent for the engine is recorded under
/// the `unsupported:*` namespace, and an ORM construct the mapper does not
/// recognise at all falls into `unknown:*`. Neither variant causes the query
/// to be rejected locally -- the engine is expected to apply conservative
/// (over-broad) invalidation for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
    Regex,
    Unsupported(String),
    Unknown(String),
}

impl FilterOperator {
    pub fn canonical_name(&self) -> String {
        match self {
            Self::Eq => "eq".to_string(),
            Self::Ne => "ne".to_string(),
            Self::Gt => "gt".to_string(),
            Self::Lt => "lt".to_string(),
            Self::Gte => "gte".to_string(),
            Self::Lte => "lte".to_string(),
            Self::Contains => "contains".to_string(),
            Self::In => "in".to_string(),
            Self::Regex => "regex".to_string(),
            Self::Unsupported(name) => format!("unsupported:{name}"),
            Self::Unknown(name) => format!("unknown:{name}"),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

impl FromStr for FilterOperator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "gte" => Self::Gte,
            "lte" => Self::Lte,
            "contains" => Self::Contains,
            "in" => Self::In,
            "regex" => Self::Regex,
            other => match other.split_once(':') {
                Some(("unsupported", rest)) => Self::Unsupported(rest.to_string()),
                Some(("unknown", rest)) => Self::Unknown(rest.to_string()),
                _ => Self::Unknown(other.to_string()),
            },
        })
    }
}

impl Serialize for FilterOperator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.canonical_name())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s).expect("FilterOperator::from_str is infallible"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_roundtrips_through_canonical_name() {
        for op in [
            FilterOperator::Eq,
            FilterOperator::Contains,
            FilterOperator::Unsupported("near".to_string()),
            FilterOperator::Unknown("fullTextSearch".to_string()),
        ] {
            let name = op.canonical_name();
            let parsed = FilterOperator::from_str(&name).unwrap();
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn equal_statements_are_equal_value_objects() {
        let a = Statement::for_model("User").with_filter(FilterNode::leaf(FilterCondition::eq(
            "id",
            serde_json::json!("u1"),
        )));
        let b = Statement::for_model("User").with_filter(FilterNode::leaf(FilterCondition::eq(
            "id",
            serde_json::json!("u1"),
        )));
        assert_eq!(a, b);
    }

    #[test]
    fn statement_serializes_to_json() {
        let stmt = Statement::for_model("User")
            .with_filter(FilterNode::and([FilterNode::leaf(FilterCondition::eq(
                "active",
                serde_json::json!(true),
            ))]))
            .with_pagination(Pagination {
                limit: Some(10),
                offset: None,
            });
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["model"], "User");
        assert_eq!(json["pagination"]["limit"], 10);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn operator_strategy() -> impl Strategy<Value = FilterOperator> {
        prop_oneof![
            Just(FilterOperator::Eq),
            Just(FilterOperator::Ne),
            Just(FilterOperator::Gt),
            Just(FilterOperator::Lt),
            Just(FilterOperator::Gte),
            Just(FilterOperator::Lte),
            Just(FilterOperator::Contains),
            Just(FilterOperator::In),
            Just(FilterOperator::Regex),
            "[a-zA-Z]{1,12}".prop_map(FilterOperator::Unsupported),
            "[a-zA-Z]{1,12}".prop_map(FilterOperator::Unknown),
        ]
    }

    fn statement_strategy() -> impl Strategy<Value = Statement> {
        ("[a-zA-Z]{1,8}", any::<bool>(), operator_strategy()).prop_map(
            |(model, has_filter, operator)| {
                let mut stmt = Statement::for_model(model);
                if has_filter {
                    stmt = stmt.with_filter(FilterNode::leaf(FilterCondition::new(
                        "field",
                        operator,
                        serde_json::json!("value"),
                    )));
                }
                stmt
            },
        )
    }

    proptest! {
        /// P1: the same Statement content must serialize to the same
        /// canonical JSON on every call -- the engine derives ShapeId
        /// determinism from exactly this stability.
        #[test]
        fn same_statement_serializes_identically_every_time(stmt in statement_strategy()) {
            let first = serde_json::to_string(&stmt).unwrap();
            let second = serde_json::to_string(&stmt).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Distinguishable statements must not collapse to the same JSON,
        /// since the engine can only key ShapeIds off of that JSON.
        #[test]
        fn distinct_models_serialize_differently(a in "[a-zA-Z]{1,8}", b in "[a-zA-Z]{1,8}") {
            prop_assume!(a != b);
            let stmt_a = Statement::for_model(a);
            let stmt_b = Statement::for_model(b);
            prop_assert_ne!(
                serde_json::to_value(&stmt_a).unwrap(),
                serde_json::to_value(&stmt_b).unwrap()
            );
        }

        /// Every operator, including the `unsupported:*`/`unknown:*` escape
        /// hatches, survives a canonical-name round trip.
        #[test]
        fn operator_roundtrips_through_canonical_name_for_any_operator(op in operator_strategy()) {
            let parsed = FilterOperator::from_str(&op.canonical_name()).unwrap();
            prop_assert_eq!(parsed, op);
        }
    }
}
