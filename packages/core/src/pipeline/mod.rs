//! Pipeline builders. Each builder is pure: the same configuration always
//! yields the same stage sequence, and nothing is executed here.

pub mod category_rollup;
pub mod performance;
pub mod summary;

pub use category_rollup::{
    OrphanPolicy, build_category_rollup_stages, build_category_rollup_stages_with,
};
pub use performance::build_sales_performance_stages;
pub use summary::build_sales_summary_stages;
