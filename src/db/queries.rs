use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::CacheRow;

/// Get a non-expired cache entry by key.
pub async fn get_cache_entry(pool: &PgPool, key: &str) -> Result<Option<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        "SELECT key, value, expires_at
         FROM cache_entries
         WHERE key = $1 AND expires_at > NOW()",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Insert or replace a cache entry. Last write wins.
pub async fn upsert_cache_entry(
    pool: &PgPool,
    key: &str,
    value: &serde_json::Value,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cache_entries (key, value, expires_at, created_at)
         VALUES ($1, $2, $3, NOW())
         ON CONFLICT (key) DO UPDATE SET
            value = EXCLUDED.value,
            expires_at = EXCLUDED.expires_at,
            created_at = NOW()",
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete every entry whose key starts with `prefix`.
///
/// Compares the literal prefix rather than using LIKE, because cache keys
/// contain `_`, which LIKE treats as a wildcard.
pub async fn delete_cache_entries_by_prefix(
    pool: &PgPool,
    prefix: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE left(key, length($1)) = $1")
        .bind(prefix)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Drop rows that have already expired.
pub async fn delete_expired_cache_entries(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Connectivity probe.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
