//! Order filters shared by the summary and performance builders, plus the
//! calendar interval used for time-series bucketing.

use crate::error::ConfigError;
use crate::stage::Condition;
use cartmetrics_types::json::json;
use chrono::{Datelike, Duration, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Who placed the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Customer,
    Guest,
}

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Calendar bucket granularity for time-series rollups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Year,
    #[default]
    Month,
    Week,
    Day,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Year => "year",
            Interval::Month => "month",
            Interval::Week => "week",
            Interval::Day => "day",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "year" | "1y" | "y" => Some(Interval::Year),
            "month" | "1mo" | "mo" => Some(Interval::Month),
            "week" | "1w" | "w" => Some(Interval::Week),
            "day" | "1d" | "d" => Some(Interval::Day),
            _ => None,
        }
    }

    /// Truncate a date to the start of its bucket.
    ///
    /// Weeks follow ISO 8601 and begin on Monday.
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Interval::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
            Interval::Month => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
            Interval::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Interval::Day => date,
        }
    }
}

/// Optional order predicate for the summary and performance pipelines.
///
/// All fields are optional; a date range requires both bounds. Bounds are
/// inclusive on both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl SalesFilter {
    /// Check the cross-field constraints: `end_date` requires `start_date`,
    /// and the range must not be inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.start_date, self.end_date) {
            (None, Some(_)) => Err(ConfigError::EndDateWithoutStart),
            (Some(start), Some(end)) if end < start => {
                Err(ConfigError::EndBeforeStart { start, end })
            }
            _ => Ok(()),
        }
    }

    /// Render the filter as match conditions. Callers must run [`validate`]
    /// first; per-field type and enum checks belong to the validation layer
    /// upstream of this crate.
    ///
    /// [`validate`]: SalesFilter::validate
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions = Vec::new();
        if let Some(user_type) = self.user_type {
            conditions.push(Condition::Eq {
                field: "user_type".to_string(),
                value: json!(user_type),
            });
        }
        if let Some(status) = self.status {
            conditions.push(Condition::Eq {
                field: "status".to_string(),
                value: json!(status),
            });
        }
        if let Some(start) = self.start_date {
            conditions.push(Condition::Gte {
                field: "date".to_string(),
                value: json!(start),
            });
        }
        if let Some(end) = self.end_date {
            conditions.push(Condition::Lte {
                field: "date".to_string(),
                value: json!(end),
            });
        }
        conditions
    }
}
