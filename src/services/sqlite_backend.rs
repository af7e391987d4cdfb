//! src/services/sqlite_backend.rs
//!
//! SqliteSchedulingBackend — scheduling inbox records kept in a single SQLite
//! table. Payloads live inline in the `calendardata` column; listings leave
//! them out so nodes materialize them on demand.

use crate::errors::{SchedulingError, SchedulingResult};
use crate::models::metadata::{ObjectMetadata, content_etag, detect_component};
use crate::services::backend::SchedulingBackend;
use bytes::Bytes;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::debug;

const MAX_OBJECT_URI_LEN: usize = 255;

/// Schema applied by [`run_migrations`].
const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(FromRow, Debug)]
struct SchedulingObjectRow {
    principaluri: String,
    uri: String,
    calendardata: Option<Vec<u8>>,
    lastmodified: Option<i64>,
    etag: Option<String>,
    size: i64,
    componenttype: Option<String>,
}

impl From<SchedulingObjectRow> for ObjectMetadata {
    fn from(row: SchedulingObjectRow) -> Self {
        ObjectMetadata {
            uri: Some(row.uri),
            principal_uri: row.principaluri,
            calendar_data: row.calendardata.map(Bytes::from),
            etag: row.etag,
            size: u64::try_from(row.size).ok(),
            last_modified: row.lastmodified,
            component: row.componenttype,
            ..ObjectMetadata::default()
        }
    }
}

/// Scheduling backend over a shared SQLite pool.
#[derive(Clone)]
pub struct SqliteSchedulingBackend {
    pub db: Arc<SqlitePool>,
}

impl SqliteSchedulingBackend {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Object URIs are inbox basenames: no separators, no parent references,
    /// no control bytes.
    fn ensure_uri_safe(&self, uri: &str) -> SchedulingResult<()> {
        if uri.is_empty() || uri.len() > MAX_OBJECT_URI_LEN {
            return Err(SchedulingError::InvalidObjectUri);
        }
        if uri.contains('/') || uri.contains("..") {
            return Err(SchedulingError::InvalidObjectUri);
        }
        if uri.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(SchedulingError::InvalidObjectUri);
        }
        Ok(())
    }

    /// List an inbox without loading payloads.
    pub async fn list_scheduling_objects(
        &self,
        principal_uri: &str,
    ) -> SchedulingResult<Vec<ObjectMetadata>> {
        let rows = sqlx::query_as::<_, SchedulingObjectRow>(
            "SELECT principaluri, uri, NULL AS calendardata, lastmodified, etag, size, componenttype
             FROM schedulingobjects
             WHERE principaluri = ?
             ORDER BY uri ASC",
        )
        .bind(principal_uri)
        .fetch_all(&*self.db)
        .await?;

        debug!("listed {} scheduling objects for {}", rows.len(), principal_uri);
        Ok(rows.into_iter().map(ObjectMetadata::from).collect())
    }

    /// Store a freshly delivered iTIP message.
    ///
    /// Scheduling objects are write-once, so an existing `(principal, uri)`
    /// pair is rejected with `AlreadyExists`.
    pub async fn create_scheduling_object(
        &self,
        principal_uri: &str,
        uri: &str,
        data: impl Into<Bytes>,
    ) -> SchedulingResult<ObjectMetadata> {
        self.ensure_uri_safe(uri)?;
        let data: Bytes = data.into();
        let etag = content_etag(&data);
        let size = data.len() as i64;
        let last_modified = Utc::now().timestamp();
        let component = detect_component(&data);

        let insert = sqlx::query(
            "INSERT INTO schedulingobjects
                (principaluri, uri, calendardata, lastmodified, etag, size, componenttype)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(principal_uri)
        .bind(uri)
        .bind(&data[..])
        .bind(last_modified)
        .bind(&etag)
        .bind(size)
        .bind(component.as_deref())
        .execute(&*self.db)
        .await;

        match insert {
            Ok(_) => {
                debug!("stored scheduling object {}/{}", principal_uri, uri);
                Ok(ObjectMetadata {
                    uri: Some(uri.to_string()),
                    principal_uri: principal_uri.to_string(),
                    calendar_data: Some(data),
                    etag: Some(etag),
                    size: u64::try_from(size).ok(),
                    last_modified: Some(last_modified),
                    component,
                    ..ObjectMetadata::default()
                })
            }
            Err(err) if is_unique_violation(&err) => Err(SchedulingError::AlreadyExists {
                principal_uri: principal_uri.to_string(),
                uri: uri.to_string(),
            }),
            Err(err) => Err(SchedulingError::Sqlx(err)),
        }
    }
}

impl SchedulingBackend for SqliteSchedulingBackend {
    async fn fetch_scheduling_object(
        &self,
        principal_uri: &str,
        uri: &str,
    ) -> SchedulingResult<ObjectMetadata> {
        self.ensure_uri_safe(uri)?;
        let row = sqlx::query_as::<_, SchedulingObjectRow>(
            "SELECT principaluri, uri, calendardata, lastmodified, etag, size, componenttype
             FROM schedulingobjects
             WHERE principaluri = ? AND uri = ?",
        )
        .bind(principal_uri)
        .bind(uri)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => SchedulingError::NotFound {
                principal_uri: principal_uri.to_string(),
                uri: uri.to_string(),
            },
            other => SchedulingError::Sqlx(other),
        })?;

        Ok(row.into())
    }

    async fn delete_scheduling_object(
        &self,
        principal_uri: &str,
        uri: &str,
    ) -> SchedulingResult<()> {
        self.ensure_uri_safe(uri)?;
        let result =
            sqlx::query("DELETE FROM schedulingobjects WHERE principaluri = ? AND uri = ?")
                .bind(principal_uri)
                .bind(uri)
                .execute(&*self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::NotFound {
                principal_uri: principal_uri.to_string(),
                uri: uri.to_string(),
            });
        }

        debug!("deleted scheduling object {}/{}", principal_uri, uri);
        Ok(())
    }
}

/// Apply the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> SchedulingResult<()> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
