//! Time-series sales performance, bucketed by a calendar interval.

use crate::error::ConfigError;
use crate::filter::{Interval, SalesFilter};
use crate::stage::{Aggregate, GroupKey, Projection, SortOrder, Stage};

/// Build a pipeline that filters orders and buckets count / revenue by the
/// given calendar interval. Output rows are
/// `{ period, count, revenue }`, ordered by ascending period; `period` is the
/// first day of the bucket (weeks begin on Monday, see
/// [`Interval::truncate`]).
pub fn build_sales_performance_stages(
    filter: &SalesFilter,
    interval: Interval,
) -> Result<Vec<Stage>, ConfigError> {
    filter.validate()?;

    let mut stages = Vec::new();
    let conditions = filter.conditions();
    if !conditions.is_empty() {
        stages.push(Stage::Match { conditions });
    }
    stages.push(Stage::Group {
        key: GroupKey::DateTrunc {
            source: "date".to_string(),
            interval,
        },
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
                name: "period".to_string(),
                source: "_id".to_string(),
            },
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
    stages.push(Stage::sort_by("period", SortOrder::Ascending));

    tracing::debug!(
        stages = stages.len(),
        interval = interval.as_str(),
        "assembled sales performance pipeline"
    );
    Ok(stages)
}
