//! Settings database operations
//!
//! Get/set accessors for the settings table following the key-value
//! pattern. Provider API keys live here at the highest resolution
//! priority (see `config::resolve_api_key`).

use dscout_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn missing_setting_is_none() {
        let db = test_db().await;
        let value: Option<String> = get_setting(&db, "nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let db = test_db().await;
        set_setting(&db, "predicthq_api_key", "phq-token").await.unwrap();
        let value: Option<String> = get_setting(&db, "predicthq_api_key").await.unwrap();
        assert_eq!(value.as_deref(), Some("phq-token"));
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let db = test_db().await;
        set_setting(&db, "k", "v1").await.unwrap();
        set_setting(&db, "k", "v2").await.unwrap();
        let value: Option<String> = get_setting(&db, "k").await.unwrap();
        assert_eq!(value.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn typed_setting_parses() {
        let db = test_db().await;
        set_setting(&db, "max_comparisons", 10usize).await.unwrap();
        let value: Option<usize> = get_setting(&db, "max_comparisons").await.unwrap();
        assert_eq!(value, Some(10));
    }
}
