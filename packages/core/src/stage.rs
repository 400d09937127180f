//! Declarative stage descriptors for aggregation pipelines.
//!
//! A pipeline is an ordered `Vec<Stage>`. Builders assemble it, an
//! [`AggregationEngine`](crate::engine::AggregationEngine) executes it; the
//! stages themselves are pure data and never touch a database.

use crate::filter::Interval;
use cartmetrics_types::json::{self, Value};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sort direction for a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One key of a (possibly compound) sort stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Predicate evaluated against a single record. `field` is a dotted path.
///
/// Range comparisons are numeric for numbers and lexicographic for strings,
/// which is order-correct for ISO-8601 dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "cmp", rename_all = "snake_case")]
pub enum Condition {
    Eq { field: String, value: Value },
    Gte { field: String, value: Value },
    Lte { field: String, value: Value },
}

/// One output field of a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Copy the value at `source` (dotted path) into output field `name`.
    /// A missing source yields an explicit null.
    Include { name: String, source: String },
    /// Remove the dotted path from the record; path segments that resolve to
    /// arrays apply the remainder to every element.
    Exclude { path: String },
}

/// Named source field used by composite group keys and collect aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyField {
    pub name: String,
    pub source: String,
}

/// Grouping key of a group stage. The key value lands in `_id` on every
/// output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    /// A single bucket spanning the whole input.
    Null,
    /// Group by the value at a dotted path.
    Field { source: String },
    /// Group by a compound key assembled from several paths.
    Composite { fields: Vec<KeyField> },
    /// Group by a date field truncated to the start of its calendar bucket.
    DateTrunc { source: String, interval: Interval },
}

/// Per-bucket aggregate of a group stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum Aggregate {
    /// Number of records in the bucket.
    Count { name: String },
    /// Numeric sum of `source` across the bucket; non-numeric values are
    /// skipped.
    Sum { name: String, source: String },
    /// Collect one sub-record per bucket member, built from `fields`, in
    /// input order.
    Collect { name: String, fields: Vec<KeyField> },
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Stage {
    /// Fan an array-valued field out into one record per element. Records
    /// whose array is missing or empty are dropped unless `keep_empty` is
    /// set, in which case they pass through with the field nulled.
    Unwind {
        path: String,
        #[serde(default)]
        keep_empty: bool,
    },
    /// Resolve a reference field against another collection. Every match is
    /// collected into an array at `target`; a null local key matches nothing.
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        target: String,
    },
    /// Keep records matching every condition.
    Match { conditions: Vec<Condition> },
    /// Reshape records. With at least one `Include` the output contains only
    /// the included fields; `Exclude` entries are applied afterwards.
    Project { fields: Vec<Projection> },
    /// Stable sort by the given keys.
    Sort { keys: Vec<SortKey> },
    /// Group records by `key` and compute the given aggregates per bucket.
    Group {
        key: GroupKey,
        aggregates: Vec<Aggregate>,
    },
}

impl Stage {
    pub fn unwind(path: impl Into<String>) -> Self {
        Stage::Unwind {
            path: path.into(),
            keep_empty: false,
        }
    }

    pub fn lookup(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Stage::Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            target: target.into(),
        }
    }

    pub fn sort_by(field: impl Into<String>, order: SortOrder) -> Self {
        Stage::Sort {
            keys: vec![SortKey {
                field: field.into(),
                order,
            }],
        }
    }

    /// Engine-facing document form of this stage.
    pub fn to_document(&self) -> Value {
        json::to_value(self).unwrap_or(Value::Null)
    }

    /// Operation tag of this stage, matching the serialized `op` field.
    pub fn op(&self) -> &'static str {
        match self {
            Stage::Unwind { .. } => "unwind",
            Stage::Lookup { .. } => "lookup",
            Stage::Match { .. } => "match",
            Stage::Project { .. } => "project",
            Stage::Sort { .. } => "sort",
            Stage::Group { .. } => "group",
        }
    }
}

/// Document form of a whole pipeline, for handing to engines that speak JSON.
pub fn to_documents(stages: &[Stage]) -> Vec<Value> {
    stages.iter().map(Stage::to_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartmetrics_types::json::json;

    #[test]
    fn test_unwind_document_shape() {
        let stage = Stage::unwind("items");
        assert_eq!(
            stage.to_document(),
            json!({ "op": "unwind", "path": "items", "keep_empty": false })
        );
    }

    #[test]
    fn test_lookup_document_shape() {
        let stage = Stage::lookup("variants", "items.variant_id", "id", "variant");
        assert_eq!(
            stage.to_document(),
            json!({
                "op": "lookup",
                "from": "variants",
                "local_field": "items.variant_id",
                "foreign_field": "id",
                "target": "variant"
            })
        );
    }

    #[test]
    fn test_group_document_round_trip() {
        let stage = Stage::Group {
            key: GroupKey::Field {
                source: "date".to_string(),
            },
            aggregates: vec![Aggregate::Count {
                name: "count".to_string(),
            }],
        };
        let doc = stage.to_document();
        assert_eq!(doc["op"], "group");
        assert_eq!(doc["key"]["kind"], "field");
        let parsed: Stage = cartmetrics_types::json::from_value(doc).unwrap();
        assert_eq!(parsed, stage);
    }

    #[test]
    fn test_pipeline_document_form() {
        let stages = vec![Stage::unwind("items"), Stage::sort_by("count", SortOrder::Descending)];
        let docs = to_documents(&stages);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["op"], "unwind");
        assert_eq!(docs[1]["op"], "sort");
    }

    #[test]
    fn test_op_tags() {
        assert_eq!(Stage::unwind("items").op(), "unwind");
        assert_eq!(
            Stage::Match { conditions: vec![] }.op(),
            "match"
        );
        assert_eq!(Stage::sort_by("count", SortOrder::Descending).op(), "sort");
    }
}
