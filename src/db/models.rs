use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A row of the `cache_entries` table.
#[derive(Debug, Clone, FromRow)]
pub struct CacheRow {
    pub key: String,
    pub value: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}
