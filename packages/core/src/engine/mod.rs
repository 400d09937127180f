//! Execution seam for built pipelines.
//!
//! Builders never execute anything; callers hand the stage sequence to an
//! [`AggregationEngine`] implementation. The in-memory reference engine in
//! [`memory`] implements the full stage semantics for tests and local use.

use crate::stage::Stage;
use cartmetrics_types::{Result, Value, async_trait};

pub mod memory;

pub use memory::MemoryEngine;

/// Capability that executes a stage sequence against a named collection and
/// returns the materialized rows.
#[async_trait]
pub trait AggregationEngine: Send + Sync {
    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Value>>;
}
