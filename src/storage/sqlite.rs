use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{ShadowComparisonRecord, ShadowComparisonStore};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl ShadowComparisonStore for SqliteStorage {
    async fn record_comparison(&self, record: &ShadowComparisonRecord) -> StorageResult<()> {
        let sdk_result = to_json(&record.sdk_result, "sdk_result")?;
        let heuristic_result = to_json(&record.heuristic_result, "heuristic_result")?;
        let match_details = record
            .match_details
            .as_ref()
            .map(|d| to_json(d, "match_details"))
            .transpose()?;
        let sdk_duration_ms = to_i64(record.sdk_duration_ms, "sdk_duration_ms")?;
        let heuristic_duration_ms = to_i64(record.heuristic_duration_ms, "heuristic_duration_ms")?;

        sqlx::query(
            r#"
            INSERT INTO shadow_comparisons (
                id, tenant_id, agent_type, sdk_result, heuristic_result,
                results_match, sdk_confidence, heuristic_confidence,
                sdk_duration_ms, heuristic_duration_ms, match_details, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.agent_type)
        .bind(&sdk_result)
        .bind(&heuristic_result)
        .bind(record.results_match)
        .bind(i64::from(record.sdk_confidence))
        .bind(i64::from(record.heuristic_confidence))
        .bind(sdk_duration_ms)
        .bind(heuristic_duration_ms)
        .bind(&match_details)
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query {
            message: format!("Failed to record shadow comparison: {}", e),
        })?;

        debug!(
            id = %record.id,
            tenant_id = %record.tenant_id,
            agent_type = %record.agent_type,
            "Shadow comparison recorded"
        );
        Ok(())
    }

    async fn list_comparisons(
        &self,
        tenant_id: &str,
        agent_type: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<ShadowComparisonRecord>> {
        let rows: Vec<ShadowComparisonRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, agent_type, sdk_result, heuristic_result,
                   results_match, sdk_confidence, heuristic_confidence,
                   sdk_duration_ms, heuristic_duration_ms, match_details, created_at
            FROM shadow_comparisons
            WHERE tenant_id = ? AND agent_type = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(agent_type)
        .bind(timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query {
            message: format!("Failed to list shadow comparisons: {}", e),
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Fixed-width UTC timestamps so `created_at` compares correctly as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json(value: &serde_json::Value, field: &str) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        message: format!("Failed to serialize {}: {}", field, e),
    })
}

fn to_i64(value: u64, field: &str) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::Serialization {
        message: format!("{} out of range: {}", field, value),
    })
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct ShadowComparisonRow {
    id: String,
    tenant_id: String,
    agent_type: String,
    sdk_result: String,
    heuristic_result: String,
    results_match: bool,
    sdk_confidence: i64,
    heuristic_confidence: i64,
    sdk_duration_ms: i64,
    heuristic_duration_ms: i64,
    match_details: Option<String>,
    created_at: String,
}

impl From<ShadowComparisonRow> for ShadowComparisonRecord {
    fn from(row: ShadowComparisonRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            agent_type: row.agent_type,
            sdk_result: serde_json::from_str(&row.sdk_result)
                .unwrap_or(serde_json::Value::String(row.sdk_result)),
            heuristic_result: serde_json::from_str(&row.heuristic_result)
                .unwrap_or(serde_json::Value::String(row.heuristic_result)),
            results_match: row.results_match,
            sdk_confidence: row.sdk_confidence.clamp(0, 100) as u8,
            heuristic_confidence: row.heuristic_confidence.clamp(0, 100) as u8,
            sdk_duration_ms: u64::try_from(row.sdk_duration_ms).unwrap_or(0),
            heuristic_duration_ms: u64::try_from(row.heuristic_duration_ms).unwrap_or(0),
            match_details: row.match_details.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}
