use chrono::NaiveDate;
use thiserror::Error;

/// Cross-field filter constraint violations.
///
/// These surface synchronously from the fallible builders, before any stage
/// is constructed. Invalid bounds are never clamped or silently dropped.
/// Runtime failures (broken reference chains, malformed documents) belong to
/// the executing engine and are not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("endDate requires startDate")]
    EndDateWithoutStart,

    #[error("endDate {end} is before startDate {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}
