use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};

use super::registry::DocumentRegistry;
use crate::core::PipelineResult;
use crate::models::{ChecklistDocument, DocumentLocation, FileRecord};

/// Registry reading the CRUD layer's SQLite tables:
///
/// - `checklist_documents(id, checklist_id, display_name, file_path, file_id)`
/// - `files(id, original_name, stored_path)`
pub struct SqliteRegistry {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct ChecklistDocumentRow {
    id: String,
    checklist_id: i64,
    display_name: String,
    file_path: Option<String>,
    file_id: Option<i64>,
}

#[derive(FromRow)]
struct FileRow {
    id: i64,
    original_name: String,
    stored_path: Option<String>,
}

impl SqliteRegistry {
    pub async fn connect(database_url: &str) -> PipelineResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(SqliteRegistry { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SqliteRegistry { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl From<ChecklistDocumentRow> for ChecklistDocument {
    fn from(row: ChecklistDocumentRow) -> Self {
        let location = match (row.file_path, row.file_id) {
            (Some(path), _) if !path.trim().is_empty() => DocumentLocation::DirectPath(path),
            (_, Some(file_id)) => DocumentLocation::FileRecord(file_id),
            _ => DocumentLocation::Missing,
        };
        ChecklistDocument {
            id: row.id,
            checklist_id: row.checklist_id,
            display_name: row.display_name,
            location,
        }
    }
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            id: row.id,
            display_name: row.original_name,
            stored_path: row.stored_path.filter(|p| !p.trim().is_empty()),
        }
    }
}

#[async_trait]
impl DocumentRegistry for SqliteRegistry {
    async fn checklist_document(
        &self,
        checklist_id: i64,
        document_id: &str,
    ) -> PipelineResult<Option<ChecklistDocument>> {
        let row = sqlx::query_as::<_, ChecklistDocumentRow>(
            r#"
            SELECT id, checklist_id, display_name, file_path, file_id
            FROM checklist_documents
            WHERE checklist_id = ?1 AND id = ?2
            "#,
        )
        .bind(checklist_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChecklistDocument::from))
    }

    async fn file_record(&self, file_id: i64) -> PipelineResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, original_name, stored_path
            FROM files
            WHERE id = ?1
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }
}
