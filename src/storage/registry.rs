use async_trait::async_trait;
use std::collections::HashMap;

use crate::core::PipelineResult;
use crate::models::{ChecklistDocument, FileRecord};

/// Read-only view of the tables the CRUD layer owns.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Checklist slot `document_id` registered under `checklist_id`.
    async fn checklist_document(
        &self,
        checklist_id: i64,
        document_id: &str,
    ) -> PipelineResult<Option<ChecklistDocument>>;

    /// Standalone uploaded file by id.
    async fn file_record(&self, file_id: i64) -> PipelineResult<Option<FileRecord>>;
}

/// Registry backed by plain maps. Used by tests and by callers that already
/// hold the records in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistry {
    checklist: HashMap<(i64, String), ChecklistDocument>,
    files: HashMap<i64, FileRecord>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_checklist_document(&mut self, document: ChecklistDocument) -> &mut Self {
        self.checklist
            .insert((document.checklist_id, document.id.clone()), document);
        self
    }

    pub fn insert_file(&mut self, record: FileRecord) -> &mut Self {
        self.files.insert(record.id, record);
        self
    }
}

#[async_trait]
impl DocumentRegistry for InMemoryRegistry {
    async fn checklist_document(
        &self,
        checklist_id: i64,
        document_id: &str,
    ) -> PipelineResult<Option<ChecklistDocument>> {
        Ok(self
            .checklist
            .get(&(checklist_id, document_id.to_string()))
            .cloned())
    }

    async fn file_record(&self, file_id: i64) -> PipelineResult<Option<FileRecord>> {
        Ok(self.files.get(&file_id).cloned())
    }
}
