//! Data shapes exchanged with PostgreSQL and the review API.
//!
//! Everything here is a flat, serde-friendly struct. Values are built once
//! per collection run and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// The PostgreSQL settings that are sent for analysis.
///
/// Each field holds the raw `pg_settings.setting` value, or an empty string
/// when the server did not report it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PgConfig {
    pub shared_buffers: String,
    pub effective_cache_size: String,
    pub maintenance_work_mem: String,
    pub checkpoint_completion_target: String,
    pub wal_buffers: String,
    pub default_statistics_target: String,
    pub random_page_cost: String,
    pub effective_io_concurrency: String,
    pub work_mem: String,
    pub min_wal_size: String,
    pub max_wal_size: String,
}

impl PgConfig {
    /// Names of the settings queried from `pg_settings`.
    pub const SETTING_NAMES: [&'static str; 11] = [
        "shared_buffers",
        "effective_cache_size",
        "maintenance_work_mem",
        "checkpoint_completion_target",
        "wal_buffers",
        "default_statistics_target",
        "random_page_cost",
        "effective_io_concurrency",
        "work_mem",
        "min_wal_size",
        "max_wal_size",
    ];

    /// Stores `value` in the field named `name`.
    ///
    /// Returns `false` for names outside the allow-list; those are ignored.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let field = match name {
            "shared_buffers" => &mut self.shared_buffers,
            "effective_cache_size" => &mut self.effective_cache_size,
            "maintenance_work_mem" => &mut self.maintenance_work_mem,
            "checkpoint_completion_target" => &mut self.checkpoint_completion_target,
            "wal_buffers" => &mut self.wal_buffers,
            "default_statistics_target" => &mut self.default_statistics_target,
            "random_page_cost" => &mut self.random_page_cost,
            "effective_io_concurrency" => &mut self.effective_io_concurrency,
            "work_mem" => &mut self.work_mem,
            "min_wal_size" => &mut self.min_wal_size,
            "max_wal_size" => &mut self.max_wal_size,
            _ => return false,
        };
        *field = value;
        true
    }
}

/// Identity of the PostgreSQL server a collection ran against.
///
/// The review API reads these keys capitalised (`Version`, `Host`,
/// `Database`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    pub version: String,
    pub host: String,
    pub database: String,
}

/// Payload of a configuration analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServerData {
    pub config: PgConfig,
    pub environment: String,
    pub server_info: ServerInfo,
}

/// A recommendation returned by the configuration analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Recommendation {
    pub content: String,
    pub criticality: String,
    pub recommendation: String,
}

/// Information about a table referenced by a reviewed query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TableInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub row_count: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
}

/// A single SQL statement submitted for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct QueryReviewRequest {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_plan: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Several statements reviewed in one call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BatchReviewRequest {
    pub queries: Vec<QueryReviewRequest>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// A migration script submitted for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MigrationReviewRequest {
    pub sql: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QueryReviewResponse {
    #[serde(rename = "overall_score")]
    pub score: i32,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BatchReviewResponse {
    #[serde(default)]
    pub results: Vec<QueryReviewResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MigrationReviewResponse {
    #[serde(rename = "overall_score")]
    pub score: i32,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
