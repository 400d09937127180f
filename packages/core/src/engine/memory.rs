//! In-memory reference engine over JSON documents.
//!
//! Implements the stage semantics the builders rely on without a live
//! database: unwind drops records whose array is missing or empty unless
//! `keep_empty` is set, lookup collects every match into the target field,
//! group output preserves first-seen key order, sorts are stable.

use crate::engine::AggregationEngine;
use crate::stage::{Aggregate, Condition, GroupKey, KeyField, Projection, SortKey, Stage};
use ahash::AHashMap;
use cartmetrics_types::json::{Map, json};
use cartmetrics_types::{Result, Value, anyhow, async_trait};
use chrono::NaiveDate;
use std::cmp::Ordering;

#[derive(Debug, Default)]
pub struct MemoryEngine {
    collections: AHashMap<String, Vec<Value>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or extend) a collection of documents.
    pub fn insert(&mut self, collection: impl Into<String>, documents: Vec<Value>) {
        self.collections
            .entry(collection.into())
            .or_default()
            .extend(documents);
    }

    fn apply_lookup(
        &self,
        docs: Vec<Value>,
        from: &str,
        local_field: &str,
        foreign_field: &str,
        target: &str,
    ) -> Vec<Value> {
        let foreign: &[Value] = self
            .collections
            .get(from)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        docs.into_iter()
            .map(|mut doc| {
                let key = get_path(&doc, local_field).cloned().unwrap_or(Value::Null);
                let matches: Vec<Value> = if key.is_null() {
                    Vec::new()
                } else {
                    foreign
                        .iter()
                        .filter(|f| get_path(f, foreign_field) == Some(&key))
                        .cloned()
                        .collect()
                };
                set_path(&mut doc, target, Value::Array(matches));
                doc
            })
            .collect()
    }
}

#[async_trait]
impl AggregationEngine for MemoryEngine {
    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Value>> {
        let mut docs = self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        tracing::debug!(
            collection,
            stages = stages.len(),
            input = docs.len(),
            "executing pipeline"
        );

        for stage in stages {
            docs = match stage {
                Stage::Unwind { path, keep_empty } => apply_unwind(docs, path, *keep_empty),
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    target,
                } => self.apply_lookup(docs, from, local_field, foreign_field, target),
                Stage::Match { conditions } => apply_match(docs, conditions),
                Stage::Project { fields } => apply_project(docs, fields),
                Stage::Sort { keys } => apply_sort(docs, keys),
                Stage::Group { key, aggregates } => apply_group(docs, key, aggregates)?,
            };
        }

        Ok(docs)
    }
}

/// Read the value at a dotted path.
fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Write a value at a dotted path, creating intermediate objects as needed.
/// Non-object intermediates swallow the write.
fn set_path(doc: &mut Value, path: &str, new: Value) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = doc {
                map.insert(path.to_string(), new);
            }
        }
        Some((head, rest)) => {
            if let Value::Object(map) = doc {
                let child = map
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                set_path(child, rest, new);
            }
        }
    }
}

/// Remove a dotted path; segments resolving to arrays apply the remainder to
/// every element.
fn remove_path(value: &mut Value, path: &str) {
    match value {
        Value::Array(items) => {
            for item in items {
                remove_path(item, path);
            }
        }
        Value::Object(map) => match path.split_once('.') {
            None => {
                map.remove(path);
            }
            Some((head, rest)) => {
                if let Some(child) = map.get_mut(head) {
                    remove_path(child, rest);
                }
            }
        },
        _ => {}
    }
}

fn apply_unwind(docs: Vec<Value>, path: &str, keep_empty: bool) -> Vec<Value> {
    let mut out = Vec::new();
    for mut doc in docs {
        match get_path(&doc, path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut clone = doc.clone();
                    set_path(&mut clone, path, item);
                    out.push(clone);
                }
            }
            // Already-scalar fields pass through untouched.
            Some(value) if !value.is_array() && !value.is_null() => out.push(doc),
            // Missing, null or empty arrays.
            _ => {
                if keep_empty {
                    set_path(&mut doc, path, Value::Null);
                    out.push(doc);
                }
            }
        }
    }
    out
}

fn apply_match(docs: Vec<Value>, conditions: &[Condition]) -> Vec<Value> {
    docs.into_iter()
        .filter(|doc| conditions.iter().all(|c| matches_condition(doc, c)))
        .collect()
}

fn matches_condition(doc: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Eq { field, value } => get_path(doc, field) == Some(value),
        Condition::Gte { field, value } => {
            compare_values(get_path(doc, field), Some(value)) != Ordering::Less
        }
        Condition::Lte { field, value } => {
            compare_values(get_path(doc, field), Some(value)) != Ordering::Greater
        }
    }
}

fn apply_project(docs: Vec<Value>, fields: &[Projection]) -> Vec<Value> {
    let includes: Vec<(&str, &str)> = fields
        .iter()
        .filter_map(|p| match p {
            Projection::Include { name, source } => Some((name.as_str(), source.as_str())),
            Projection::Exclude { .. } => None,
        })
        .collect();
    let excludes: Vec<&str> = fields
        .iter()
        .filter_map(|p| match p {
            Projection::Exclude { path } => Some(path.as_str()),
            Projection::Include { .. } => None,
        })
        .collect();

    docs.into_iter()
        .map(|doc| {
            let mut out = if includes.is_empty() {
                doc
            } else {
                let mut map = Map::new();
                for (name, source) in &includes {
                    let value = get_path(&doc, source).cloned().unwrap_or(Value::Null);
                    map.insert((*name).to_string(), value);
                }
                Value::Object(map)
            };
            for path in &excludes {
                remove_path(&mut out, path);
            }
            out
        })
        .collect()
}

fn apply_sort(mut docs: Vec<Value>, keys: &[SortKey]) -> Vec<Value> {
    use crate::stage::SortOrder;
    docs.sort_by(|a, b| {
        for key in keys {
            let mut ord = compare_values(get_path(a, &key.field), get_path(b, &key.field));
            if key.order == SortOrder::Descending {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    docs
}

/// Total order over the value types the pipelines sort and range-match on.
/// Numbers compare numerically, strings lexicographically (order-correct for
/// ISO-8601 dates); missing sorts before present, mixed types tie.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn apply_group(docs: Vec<Value>, key: &GroupKey, aggregates: &[Aggregate]) -> Result<Vec<Value>> {
    // First-seen key order keeps the engine deterministic for inputs that
    // are not re-sorted afterwards.
    let mut order: Vec<String> = Vec::new();
    let mut buckets: AHashMap<String, (Value, Vec<Value>)> = AHashMap::new();

    for doc in docs {
        let key_value = group_key_value(&doc, key)?;
        let repr = key_value.to_string();
        buckets
            .entry(repr.clone())
            .or_insert_with(|| {
                order.push(repr);
                (key_value, Vec::new())
            })
            .1
            .push(doc);
    }

    order
        .iter()
        .map(|repr| {
            let (key_value, members) = buckets
                .get(repr)
                .ok_or_else(|| anyhow!("group bucket '{}' disappeared", repr))?;
            let mut row = Map::new();
            row.insert("_id".to_string(), key_value.clone());
            for aggregate in aggregates {
                match aggregate {
                    Aggregate::Count { name } => {
                        row.insert(name.clone(), json!(members.len() as i64));
                    }
                    Aggregate::Sum { name, source } => {
                        let total: f64 = members
                            .iter()
                            .filter_map(|m| get_path(m, source).and_then(Value::as_f64))
                            .sum();
                        let value = if total.fract() == 0.0 {
                            json!(total as i64)
                        } else {
                            json!(total)
                        };
                        row.insert(name.clone(), value);
                    }
                    Aggregate::Collect { name, fields } => {
                        let rows: Vec<Value> = members.iter().map(|m| sub_record(m, fields)).collect();
                        row.insert(name.clone(), Value::Array(rows));
                    }
                }
            }
            Ok(Value::Object(row))
        })
        .collect()
}

fn sub_record(doc: &Value, fields: &[KeyField]) -> Value {
    let mut map = Map::new();
    for field in fields {
        let value = get_path(doc, &field.source).cloned().unwrap_or(Value::Null);
        map.insert(field.name.clone(), value);
    }
    Value::Object(map)
}

fn group_key_value(doc: &Value, key: &GroupKey) -> Result<Value> {
    match key {
        GroupKey::Null => Ok(Value::Null),
        GroupKey::Field { source } => Ok(get_path(doc, source).cloned().unwrap_or(Value::Null)),
        GroupKey::Composite { fields } => Ok(sub_record(doc, fields)),
        GroupKey::DateTrunc { source, interval } => {
            let raw = get_path(doc, source)
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("group key '{}' is not a date string", source))?;
            // Tolerate datetime strings by truncating to the date prefix.
            let prefix = raw.get(..10).unwrap_or(raw);
            let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
                .map_err(|e| anyhow!("group key '{}' has invalid date '{}': {}", source, raw, e))?;
            Ok(json!(interval.truncate(date)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Interval;
    use crate::stage::SortOrder;

    #[test]
    fn test_unwind_fans_out_and_drops_empty() {
        let input = vec![
            json!({ "id": "a", "items": [1, 2] }),
            json!({ "id": "b", "items": [] }),
            json!({ "id": "c" }),
        ];
        let out = apply_unwind(input, "items", false);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "id": "a", "items": 1 }));
        assert_eq!(out[1], json!({ "id": "a", "items": 2 }));
    }

    #[test]
    fn test_unwind_keep_empty_nulls_the_field() {
        let input = vec![json!({ "id": "b", "items": [] })];
        let out = apply_unwind(input, "items", true);
        assert_eq!(out, vec![json!({ "id": "b", "items": null })]);
    }

    #[test]
    fn test_lookup_collects_matches() {
        let mut engine = MemoryEngine::new();
        engine.insert(
            "variants",
            vec![
                json!({ "id": "v1", "product_id": "p1" }),
                json!({ "id": "v2", "product_id": "p2" }),
            ],
        );
        let input = vec![json!({ "items": { "variant_id": "v2" } })];
        let out = engine.apply_lookup(input, "variants", "items.variant_id", "id", "variant");
        assert_eq!(
            out[0]["variant"],
            json!([{ "id": "v2", "product_id": "p2" }])
        );
    }

    #[test]
    fn test_lookup_null_key_matches_nothing() {
        let mut engine = MemoryEngine::new();
        engine.insert("variants", vec![json!({ "id": null })]);
        let input = vec![json!({ "items": {} })];
        let out = engine.apply_lookup(input, "variants", "items.variant_id", "id", "variant");
        assert_eq!(out[0]["variant"], json!([]));
    }

    #[test]
    fn test_match_date_range_is_inclusive() {
        let input = vec![
            json!({ "date": "2024-01-01" }),
            json!({ "date": "2024-01-15" }),
            json!({ "date": "2024-02-01" }),
        ];
        let conditions = vec![
            Condition::Gte {
                field: "date".to_string(),
                value: json!("2024-01-01"),
            },
            Condition::Lte {
                field: "date".to_string(),
                value: json!("2024-01-15"),
            },
        ];
        let out = apply_match(input, &conditions);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let input = vec![
            json!({ "id": "first", "count": 2 }),
            json!({ "id": "second", "count": 2 }),
            json!({ "id": "third", "count": 5 }),
        ];
        let out = apply_sort(
            input,
            &[SortKey {
                field: "count".to_string(),
                order: SortOrder::Descending,
            }],
        );
        assert_eq!(out[0]["id"], "third");
        assert_eq!(out[1]["id"], "first");
        assert_eq!(out[2]["id"], "second");
    }

    #[test]
    fn test_group_preserves_first_seen_order() {
        let input = vec![
            json!({ "date": "2024-01-02" }),
            json!({ "date": "2024-01-01" }),
            json!({ "date": "2024-01-02" }),
        ];
        let out = apply_group(
            input,
            &GroupKey::Field {
                source: "date".to_string(),
            },
            &[Aggregate::Count {
                name: "count".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({ "_id": "2024-01-02", "count": 2 }));
        assert_eq!(out[1], json!({ "_id": "2024-01-01", "count": 1 }));
    }

    #[test]
    fn test_group_sum_skips_non_numeric() {
        let input = vec![
            json!({ "total": 1000 }),
            json!({ "total": "broken" }),
            json!({ "total": 250 }),
        ];
        let out = apply_group(
            input,
            &GroupKey::Null,
            &[Aggregate::Sum {
                name: "revenue".to_string(),
                source: "total".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(out[0]["revenue"], json!(1250));
    }

    #[test]
    fn test_group_date_trunc_month() {
        let input = vec![
            json!({ "date": "2024-01-02" }),
            json!({ "date": "2024-01-30" }),
            json!({ "date": "2024-02-01" }),
        ];
        let out = apply_group(
            input,
            &GroupKey::DateTrunc {
                source: "date".to_string(),
                interval: Interval::Month,
            },
            &[Aggregate::Count {
                name: "count".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["_id"], "2024-01-01");
        assert_eq!(out[0]["count"], 2);
    }

    #[test]
    fn test_group_date_trunc_rejects_non_dates() {
        let input = vec![json!({ "date": 42 })];
        let result = apply_group(
            input,
            &GroupKey::DateTrunc {
                source: "date".to_string(),
                interval: Interval::Day,
            },
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_project_include_then_exclude() {
        let input = vec![json!({
            "_id": "2024-01-02",
            "categories": [
                { "category": { "id": "c1", "slug": "books", "name": "Books" }, "count": 1 }
            ]
        })];
        let out = apply_project(
            input,
            &[
                Projection::Include {
                    name: "date".to_string(),
                    source: "_id".to_string(),
                },
                Projection::Include {
                    name: "categories".to_string(),
                    source: "categories".to_string(),
                },
                Projection::Exclude {
                    path: "categories.category.id".to_string(),
                },
            ],
        );
        assert_eq!(
            out[0],
            json!({
                "date": "2024-01-02",
                "categories": [
                    { "category": { "slug": "books", "name": "Books" }, "count": 1 }
                ]
            })
        );
    }

    #[test]
    fn test_project_missing_source_yields_null() {
        let input = vec![json!({ "count": 1 })];
        let out = apply_project(
            input,
            &[Projection::Include {
                name: "category".to_string(),
                source: "category".to_string(),
            }],
        );
        assert_eq!(out[0], json!({ "category": null }));
    }
}
