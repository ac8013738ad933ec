//! SQLite-backed record and user storage.
//!
//! Field maps are stored as JSON text; timestamps as fixed-width RFC 3339
//! strings so that `ORDER BY created_at` is chronological.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use keel_auth::UserAccount;
use keel_core::{Record, RecordId, TenantId, UserId};

use super::{RecordStore, StoreError, UserStore};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url {url}"))?
            .create_if_missing(true);

        // An in-memory database lives and dies with its connection.
        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite database at {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                tenant_id  TEXT NOT NULL,
                resource   TEXT NOT NULL,
                id         TEXT NOT NULL,
                status     TEXT NULL,
                fields     TEXT NOT NULL,
                version    INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, resource, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create records table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                tenant_id     TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create users table")?;

        Ok(())
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("invalid timestamp {s:?}: {e}")))
}

fn corrupt(e: impl core::fmt::Display) -> StoreError {
    StoreError::Storage(format!("corrupt row: {e}"))
}

fn record_from_row(row: &SqliteRow) -> Result<Record, StoreError> {
    let tenant_id: String = row.try_get("tenant_id")?;
    let id: String = row.try_get("id")?;
    let fields: String = row.try_get("fields")?;
    let version: i64 = row.try_get("version")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Record {
        id: id.parse::<RecordId>().map_err(corrupt)?,
        tenant_id: tenant_id.parse::<TenantId>().map_err(corrupt)?,
        resource: row.try_get("resource")?,
        status: row.try_get("status")?,
        fields: serde_json::from_str(&fields).map_err(corrupt)?,
        version: u64::try_from(version).map_err(corrupt)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn account_from_row(row: &SqliteRow) -> Result<UserAccount, StoreError> {
    let id: String = row.try_get("id")?;
    let tenant_id: String = row.try_get("tenant_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(UserAccount {
        id: id.parse::<UserId>().map_err(corrupt)?,
        tenant_id: tenant_id.parse::<TenantId>().map_err(corrupt)?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn fields_json(record: &Record) -> Result<String, StoreError> {
    serde_json::to_string(&record.fields).map_err(|e| StoreError::Storage(e.to_string()))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: Record) -> Result<Record, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO records (tenant_id, resource, id, status, fields, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(record.tenant_id.to_string())
        .bind(&record.resource)
        .bind(record.id.to_string())
        .bind(&record.status)
        .bind(fields_json(&record)?)
        .bind(record.version as i64)
        .bind(ts(&record.created_at))
        .bind(ts(&record.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict(format!("record {} already exists", record.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, resource, id, status, fields, version, created_at, updated_at
            FROM records
            WHERE tenant_id = ?1 AND resource = ?2 AND id = ?3
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(resource)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self, tenant_id: TenantId, resource: &str) -> Result<Vec<Record>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, resource, id, status, fields, version, created_at, updated_at
            FROM records
            WHERE tenant_id = ?1 AND resource = ?2
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(resource)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn update(&self, record: Record) -> Result<Record, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE records
            SET status = ?1, fields = ?2, version = ?3, updated_at = ?4
            WHERE tenant_id = ?5 AND resource = ?6 AND id = ?7
            "#,
        )
        .bind(&record.status)
        .bind(fields_json(&record)?)
        .bind(record.version as i64)
        .bind(ts(&record.updated_at))
        .bind(record.tenant_id.to_string())
        .bind(&record.resource)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(record)
    }

    async fn delete(&self, tenant_id: TenantId, resource: &str, id: RecordId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE tenant_id = ?1 AND resource = ?2 AND id = ?3")
            .bind(tenant_id.to_string())
            .bind(resource)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create(&self, account: UserAccount) -> Result<UserAccount, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.tenant_id.to_string())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(ts(&account.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(account),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict(format!("{} is already registered", account.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, email, password_hash, created_at FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }
}
