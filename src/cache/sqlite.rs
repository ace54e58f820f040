use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{ConnectOptions, Row, SqlitePool, sqlite::SqliteConnectOptions};

use crate::error::AppError;

use super::{CacheEntry, CacheNamespace};

/// SQLite 持久缓存层
#[derive(Clone)]
pub struct SqliteCacheStorage {
    pub pool: SqlitePool,
}

impl SqliteCacheStorage {
    pub async fn connect_sqlite(path: &str, wal: bool) -> Result<Self, AppError> {
        if let Some(dir) = Path::new(path).parent() {
            tokio::fs::create_dir_all(dir).await.ok();
        }
        let opt = SqliteConnectOptions::new()
            .filename(Path::new(path))
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Off);
        let pool = SqlitePool::connect_with(opt)
            .await
            .map_err(|e| AppError::Cache(format!("sqlite connect: {e}")))?;
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await
                .ok();
        }
        sqlx::query("PRAGMA synchronous=NORMAL;")
            .execute(&pool)
            .await
            .ok();
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<(), AppError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            namespace TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            content_type TEXT,
            headers_json TEXT NOT NULL DEFAULT '[]',
            body BLOB NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY(namespace, cache_key)
        );
        "#;
        sqlx::raw_sql(ddl).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get(
        &self,
        ns: CacheNamespace,
        key: &str,
    ) -> Result<Option<CacheEntry>, AppError> {
        let row = sqlx::query(
            "SELECT content_type, headers_json, body, stored_at FROM cache_entries WHERE namespace = ? AND cache_key = ?",
        )
        .bind(ns.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let headers_json: String = row.try_get("headers_json")?;
        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
            .map_err(|e| AppError::Cache(format!("headers_json 解析失败: {e}")))?;
        let body: Vec<u8> = row.try_get("body")?;
        let stored_at: DateTime<Utc> = row.try_get("stored_at")?;

        Ok(Some(CacheEntry {
            content_type: row.try_get("content_type")?,
            headers,
            body: body.into(),
            stored_at,
        }))
    }

    pub async fn put(
        &self,
        ns: CacheNamespace,
        key: &str,
        entry: &CacheEntry,
    ) -> Result<(), AppError> {
        let headers_json = serde_json::to_string(&entry.headers)
            .map_err(|e| AppError::Cache(format!("headers_json 序列化失败: {e}")))?;
        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries(namespace, cache_key, content_type, headers_json, body, stored_at) VALUES(?,?,?,?,?,?)",
        )
        .bind(ns.as_str())
        .bind(key)
        .bind(entry.content_type.as_deref())
        .bind(headers_json)
        .bind(entry.body.as_ref())
        .bind(entry.stored_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
