//! Declarative aggregation pipelines for storefront sales analytics.
//!
//! The builders in [`pipeline`] assemble ordered [`Stage`] sequences that
//! roll raw order / line-item documents up into category breakdowns,
//! filtered totals and calendar time series. Execution is delegated to an
//! [`engine::AggregationEngine`]; the crate ships an in-memory reference
//! engine so pipelines are testable without a database.

pub mod engine;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod rows;
pub mod stage;

/// Collection names the builders reference.
pub mod collections {
    pub const ORDERS: &str = "orders";
    pub const VARIANTS: &str = "variants";
    pub const PRODUCTS: &str = "products";
    pub const CATEGORIES: &str = "categories";
}

pub use error::ConfigError;
pub use filter::{Interval, OrderStatus, SalesFilter, UserType};
pub use pipeline::{
    OrphanPolicy, build_category_rollup_stages, build_category_rollup_stages_with,
    build_sales_performance_stages, build_sales_summary_stages,
};
pub use stage::Stage;
