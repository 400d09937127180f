//! Filtered total count / revenue summary over the orders collection.

use crate::error::ConfigError;
use crate::filter::SalesFilter;
use crate::stage::{Aggregate, GroupKey, Projection, Stage};

/// Build a pipeline that filters orders and aggregates total order count and
/// revenue into a single `{ count, revenue }` row.
///
/// Fails fast on cross-field filter violations; no stage sequence is
/// produced for an invalid filter.
pub fn build_sales_summary_stages(filter: &SalesFilter) -> Result<Vec<Stage>, ConfigError> {
    filter.validate()?;

    let mut stages = Vec::new();
    let conditions = filter.conditions();
    if !conditions.is_empty() {
        stages.push(Stage::Match { conditions });
    }
    stages.push(Stage::Group {
        key: GroupKey::Null,
        aggregates: vec![
            Aggregate::Count {
                name: "count".to_string(),
            },
            Aggregate::Sum {
                name: "revenue".to_string(),
                source: "total".to_string(),
            },
        ],
    });
    stages.push(Stage::Project {
        fields: vec![
            Projection::Include {
                name: "count".to_string(),
                source: "count".to_string(),
            },
            Projection::Include {
                name: "revenue".to_string(),
                source: "revenue".to_string(),
            },
        ],
    });

    tracing::debug!(stages = stages.len(), "assembled sales summary pipeline");
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::filter::OrderStatus;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_filter_skips_match_stage() {
        let stages = build_sales_summary_stages(&SalesFilter::default()).unwrap();
        let ops: Vec<&str> = stages.iter().map(Stage::op).collect();
        assert_eq!(ops, vec!["group", "project"]);
    }

    #[test]
    fn test_filter_prepends_match_stage() {
        let filter = SalesFilter {
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        };
        let stages = build_sales_summary_stages(&filter).unwrap();
        let ops: Vec<&str> = stages.iter().map(Stage::op).collect();
        assert_eq!(ops, vec!["match", "group", "project"]);
    }

    #[test]
    fn test_end_date_without_start_is_refused() {
        let filter = SalesFilter {
            end_date: Some(date(2024, 3, 1)),
            ..Default::default()
        };
        assert_eq!(
            build_sales_summary_stages(&filter),
            Err(ConfigError::EndDateWithoutStart)
        );
    }

    #[test]
    fn test_inverted_range_is_refused() {
        let filter = SalesFilter {
            start_date: Some(date(2024, 3, 2)),
            end_date: Some(date(2024, 3, 1)),
            ..Default::default()
        };
        assert_eq!(
            build_sales_summary_stages(&filter),
            Err(ConfigError::EndBeforeStart {
                start: date(2024, 3, 2),
                end: date(2024, 3, 1),
            })
        );
    }
}
