//! SQLite workflow index implementation.
//!
//! Implements `WorkflowIndex` from `flowdeck-core` using sqlx with split
//! read/write pools.

use flowdeck_core::repository::WorkflowIndex;
use flowdeck_types::error::RepositoryError;
use flowdeck_types::workflow::WorkflowRecord;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowIndex`.
pub struct SqliteWorkflowIndex {
    pool: DatabasePool,
}

impl SqliteWorkflowIndex {
    /// Create a new index backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to the domain record.
struct WorkflowRow {
    uuid: String,
    name: String,
    online_version: Option<String>,
    locations: Option<String>,
    project_code: Option<i64>,
    project_name: Option<String>,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            uuid: row.try_get("uuid")?,
            name: row.try_get("name")?,
            online_version: row.try_get("online_version")?,
            locations: row.try_get("locations")?,
            project_code: row.try_get("project_code")?,
            project_name: row.try_get("project_name")?,
        })
    }

    fn into_record(self) -> Result<WorkflowRecord, RepositoryError> {
        let uuid = self
            .uuid
            .parse::<Uuid>()
            .map_err(|e| RepositoryError::Query(format!("invalid workflow uuid: {e}")))?;

        Ok(WorkflowRecord {
            uuid,
            name: self.name,
            online_version: self.online_version,
            locations: self.locations,
            project_code: self.project_code,
            project_name: self.project_name,
        })
    }
}

fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowRecord, RepositoryError> {
    WorkflowRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_record()
}

impl WorkflowIndex for SqliteWorkflowIndex {
    async fn put(&self, record: &WorkflowRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO workflows (uuid, name, online_version, locations, project_code, project_name)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(uuid) DO UPDATE SET
                 name = excluded.name,
                 online_version = excluded.online_version,
                 locations = excluded.locations,
                 project_code = excluded.project_code,
                 project_name = excluded.project_name",
        )
        .bind(record.uuid.to_string())
        .bind(&record.name)
        .bind(&record.online_version)
        .bind(&record.locations)
        .bind(record.project_code)
        .bind(&record.project_name)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "workflow name '{}' already exists",
                    record.name
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, uuid: &Uuid) -> Result<Option<WorkflowRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_row).transpose()
    }

    async fn delete(&self, uuid: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE uuid = ?")
            .bind(uuid.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, uuid: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT uuid FROM workflows WHERE uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<WorkflowRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_row).transpose()
    }

    async fn find_by_name_excluding(
        &self,
        name: &str,
        uuid: &Uuid,
    ) -> Result<Option<WorkflowRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE name = ? AND uuid != ?")
            .bind(name)
            .bind(uuid.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<WorkflowRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM workflows ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(map_row).collect()
    }
}
