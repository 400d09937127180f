//! Shared plumbing for the cartmetrics workspace: the catch-all error type,
//! json helpers and id generation. Domain crates re-export what they need
//! from here instead of depending on the underlying crates directly.

pub use anyhow::{Context, Error, anyhow, bail};
pub use async_trait::async_trait;
pub use serde_json::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod json {
    pub use serde_json::{
        Map, Number, Value, from_slice, from_str, from_value, json, to_string, to_string_pretty,
        to_value,
    };
}

/// Generate a collision-resistant identifier for rows and reports.
pub fn create_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
