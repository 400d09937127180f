//! Per-category, per-date sales rollup.
//!
//! Line items fan out of their orders, resolve through the
//! variant -> product -> category chain, and are counted per (date, category)
//! bucket. Buckets are then enriched with the human-readable category,
//! ordered by count within each date, and re-grouped into one row per date.

use crate::collections;
use crate::stage::{
    Aggregate, GroupKey, KeyField, Projection, SortOrder, Stage,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What to do with line items whose variant/product/category chain is broken
/// (a soft-deleted variant, product or category).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Drop the line item from every output row.
    #[default]
    Exclude,
    /// Keep the line item; its category resolves to null.
    Retain,
}

/// Build the category rollup pipeline with the default [`OrphanPolicy`].
pub fn build_category_rollup_stages() -> Vec<Stage> {
    build_category_rollup_stages_with(OrphanPolicy::default())
}

/// Build the category rollup pipeline, run against the orders collection.
///
/// Output rows have the shape
/// `{ date, categories: [{ category: { slug, name }, count }, ..] }` with
/// categories ordered by descending count and rows ordered by ascending date.
pub fn build_category_rollup_stages_with(policy: OrphanPolicy) -> Vec<Stage> {
    // With `Retain`, records whose join produced no match survive the
    // post-lookup unwinds instead of being dropped.
    let keep_orphans = matches!(policy, OrphanPolicy::Retain);

    let stages = vec![
        // One record per purchased line item.
        Stage::unwind("items"),
        // Line item -> variant. The foreign key is unique, so the
        // lookup/unwind pair keeps cardinality at 1:1.
        Stage::lookup(collections::VARIANTS, "items.variant_id", "id", "variant"),
        Stage::Unwind {
            path: "variant".to_string(),
            keep_empty: keep_orphans,
        },
        // Variant -> product.
        Stage::lookup(collections::PRODUCTS, "variant.product_id", "id", "product"),
        Stage::Unwind {
            path: "product".to_string(),
            keep_empty: keep_orphans,
        },
        // Count line items per (date, category).
        Stage::Group {
            key: GroupKey::Composite {
                fields: vec![
                    KeyField {
                        name: "date".to_string(),
                        source: "date".to_string(),
                    },
                    KeyField {
                        name: "category".to_string(),
                        source: "product.category_id".to_string(),
                    },
                ],
            },
            aggregates: vec![Aggregate::Count {
                name: "count".to_string(),
            }],
        },
        // Category id -> human-readable category.
        Stage::lookup(collections::CATEGORIES, "_id.category", "id", "category"),
        Stage::Unwind {
            path: "category".to_string(),
            keep_empty: keep_orphans,
        },
        Stage::Project {
            fields: vec![
                Projection::Include {
                    name: "date".to_string(),
                    source: "_id.date".to_string(),
                },
                Projection::Include {
                    name: "category".to_string(),
                    source: "category".to_string(),
                },
                Projection::Include {
                    name: "count".to_string(),
                    source: "count".to_string(),
                },
            ],
        },
        // Busiest categories first within each date.
        Stage::sort_by("count", SortOrder::Descending),
        Stage::Group {
            key: GroupKey::Field {
                source: "date".to_string(),
            },
            aggregates: vec![Aggregate::Collect {
                name: "categories".to_string(),
                fields: vec![
                    KeyField {
                        name: "category".to_string(),
                        source: "category".to_string(),
                    },
                    KeyField {
                        name: "count".to_string(),
                        source: "count".to_string(),
                    },
                ],
            }],
        },
        // The category id was only needed for the joins.
        Stage::Project {
            fields: vec![
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
        },
        Stage::sort_by("date", SortOrder::Ascending),
    ];

    tracing::debug!(
        stages = stages.len(),
        policy = ?policy,
        "assembled category rollup pipeline"
    );
    stages
}
