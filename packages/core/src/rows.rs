//! Typed views over the rows an engine materializes for each pipeline.

use cartmetrics_types::json::from_value;
use cartmetrics_types::{Result, Value};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Human-readable category projection; the internal id is stripped by the
/// pipeline before rows reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRef {
    pub slug: String,
    pub name: String,
}

/// One category's line-item count within a date group. `category` is `None`
/// only for orphaned line items kept by
/// [`OrphanPolicy::Retain`](crate::pipeline::OrphanPolicy::Retain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorySalesRow {
    pub category: Option<CategoryRef>,
    pub count: i64,
}

/// One output row of the category rollup pipeline: categories for a single
/// date, ordered by descending count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub categories: Vec<CategorySalesRow>,
}

/// Single-row output of the sales summary pipeline. Revenue is in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub count: i64,
    pub revenue: i64,
}

/// One time bucket of the sales performance pipeline. `period` is the first
/// day of the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBucket {
    pub period: NaiveDate,
    pub count: i64,
    pub revenue: i64,
}

/// Deserialize category rollup output rows.
pub fn daily_rollups(rows: Vec<Value>) -> Result<Vec<DailyRollup>> {
    rows.into_iter()
        .map(|row| Ok(from_value(row)?))
        .collect()
}

/// Deserialize the summary row. An empty result set (no orders matched the
/// filter) collapses to an all-zero summary.
pub fn sales_summary(rows: Vec<Value>) -> Result<SalesSummary> {
    match rows.into_iter().next() {
        Some(row) => Ok(from_value(row)?),
        None => Ok(SalesSummary::default()),
    }
}

/// Deserialize performance time-series rows.
pub fn performance_buckets(rows: Vec<Value>) -> Result<Vec<PerformanceBucket>> {
    rows.into_iter()
        .map(|row| Ok(from_value(row)?))
        .collect()
}
