use std::sync::Arc;

use crate::core::PipelineResult;
use crate::models::{
    ChecklistDocument, DocumentLocation, DocumentRef, DocumentReference, ResolvedDocument,
    SkipReason, LEGACY_PREFIX,
};
use crate::storage::{DocumentRegistry, PathResolver};

/// What became of one reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedDocument),
    Skipped(SkipReason),
}

impl From<Result<ResolvedDocument, SkipReason>> for Resolution {
    fn from(result: Result<ResolvedDocument, SkipReason>) -> Self {
        match result {
            Ok(document) => Resolution::Resolved(document),
            Err(reason) => Resolution::Skipped(reason),
        }
    }
}

/// Maps document references to readable files, trying the checklist table
/// before the generic file store.
pub struct DocumentResolver {
    registry: Arc<dyn DocumentRegistry>,
    paths: PathResolver,
    max_file_id: i64,
}

impl DocumentResolver {
    pub fn new(registry: Arc<dyn DocumentRegistry>, paths: PathResolver, max_file_id: i64) -> Self {
        DocumentResolver {
            registry,
            paths,
            max_file_id,
        }
    }

    /// Registry failures propagate; everything else that prevents a
    /// reference from resolving is reported as a skip.
    pub async fn resolve(
        &self,
        reference: &DocumentReference,
        checklist_id: i64,
    ) -> PipelineResult<Resolution> {
        let order = reference.order;

        let result = match &reference.id {
            DocumentRef::ChecklistDoc(id) => {
                match self.registry.checklist_document(checklist_id, id).await? {
                    Some(entry) => self.from_checklist(entry, order).await?,
                    None => match self.file_store_id(id) {
                        Ok(Some(file_id)) => self.from_file_store(file_id, None, order).await?,
                        Ok(None) => Err(SkipReason::NotFound),
                        Err(reason) => Err(reason),
                    },
                }
            }
            DocumentRef::RawFile(file_id) | DocumentRef::LegacyPrefixed(file_id) => {
                match self.check_file_id(*file_id) {
                    Ok(file_id) => self.from_file_store(file_id, None, order).await?,
                    Err(reason) => Err(reason),
                }
            }
        };

        match &result {
            Ok(document) => tracing::debug!(
                reference = %reference.id,
                path = %document.source_path.display(),
                "Resolved document"
            ),
            Err(reason) => tracing::warn!(
                reference = %reference.id,
                checklist_id,
                reason = %reason,
                "Dropping unresolved document"
            ),
        }

        Ok(result.into())
    }

    pub async fn resolve_all(
        &self,
        references: &[DocumentReference],
        checklist_id: i64,
    ) -> PipelineResult<Vec<(DocumentReference, Resolution)>> {
        let mut resolutions = Vec::with_capacity(references.len());
        for reference in references {
            let resolution = self.resolve(reference, checklist_id).await?;
            resolutions.push((reference.clone(), resolution));
        }
        Ok(resolutions)
    }

    async fn from_checklist(
        &self,
        entry: ChecklistDocument,
        order: i64,
    ) -> PipelineResult<Result<ResolvedDocument, SkipReason>> {
        match entry.location {
            DocumentLocation::DirectPath(stored) => Ok(self.paths.locate(&stored).map(|source_path| {
                ResolvedDocument {
                    display_name: entry.display_name,
                    order,
                    source_path,
                }
            })),
            DocumentLocation::FileRecord(file_id) => match self.check_file_id(file_id) {
                Ok(file_id) => self.from_file_store(file_id, Some(entry.display_name), order).await,
                Err(reason) => Ok(Err(reason)),
            },
            DocumentLocation::Missing => Ok(Err(SkipReason::NoUsablePath)),
        }
    }

    async fn from_file_store(
        &self,
        file_id: i64,
        display_name: Option<String>,
        order: i64,
    ) -> PipelineResult<Result<ResolvedDocument, SkipReason>> {
        let Some(record) = self.registry.file_record(file_id).await? else {
            return Ok(Err(SkipReason::NotFound));
        };
        let Some(stored) = record.stored_path.as_deref() else {
            return Ok(Err(SkipReason::NoUsablePath));
        };

        Ok(self.paths.locate(stored).map(|source_path| ResolvedDocument {
            display_name: display_name.unwrap_or(record.display_name),
            order,
            source_path,
        }))
    }

    /// Interprets a checklist id as a file-store id. `Ok(None)` when it is not
    /// numeric at all; an error when it is numeric but outside the id space.
    fn file_store_id(&self, raw: &str) -> Result<Option<i64>, SkipReason> {
        let digits = raw.strip_prefix(LEGACY_PREFIX).unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        match digits.parse::<i64>() {
            Ok(id) => self.check_file_id(id).map(Some),
            Err(_) => Err(SkipReason::IdOutOfRange(digits.to_string())),
        }
    }

    fn check_file_id(&self, id: i64) -> Result<i64, SkipReason> {
        if id >= 1 && id <= self.max_file_id {
            Ok(id)
        } else {
            Err(SkipReason::IdOutOfRange(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRecord;
    use crate::storage::InMemoryRegistry;
    use std::path::Path;

    const CHECKLIST: i64 = 7;

    fn registry(dir: &Path) -> InMemoryRegistry {
        for name in ["pan.pdf", "gst.pdf", "brief.pdf"] {
            std::fs::write(dir.join(name), b"%PDF-1.4").unwrap();
        }

        let mut registry = InMemoryRegistry::new();
        registry
            .insert_checklist_document(ChecklistDocument {
                id: "pan".to_string(),
                checklist_id: CHECKLIST,
                display_name: "PAN Card".to_string(),
                location: DocumentLocation::DirectPath("pan.pdf".to_string()),
            })
            .insert_checklist_document(ChecklistDocument {
                id: "gst".to_string(),
                checklist_id: CHECKLIST,
                display_name: "GST Certificate".to_string(),
                location: DocumentLocation::FileRecord(30),
            })
            .insert_checklist_document(ChecklistDocument {
                id: "empty".to_string(),
                checklist_id: CHECKLIST,
                display_name: "Empty".to_string(),
                location: DocumentLocation::Missing,
            })
            .insert_checklist_document(ChecklistDocument {
                id: "ghost".to_string(),
                checklist_id: CHECKLIST,
                display_name: "Ghost".to_string(),
                location: DocumentLocation::DirectPath("ghost.pdf".to_string()),
            })
            .insert_file(FileRecord {
                id: 30,
                display_name: "gst-upload.pdf".to_string(),
                stored_path: Some("gst.pdf".to_string()),
            })
            .insert_file(FileRecord {
                id: 31,
                display_name: "Briefcase scan".to_string(),
                stored_path: Some(dir.join("brief.pdf").display().to_string()),
            })
            .insert_file(FileRecord {
                id: 32,
                display_name: "No path".to_string(),
                stored_path: None,
            });
        registry
    }

    fn resolver(dir: &Path) -> DocumentResolver {
        DocumentResolver::new(Arc::new(registry(dir)), PathResolver::new(dir), i32::MAX as i64)
    }

    fn reference(raw: &str) -> DocumentReference {
        DocumentReference::new(DocumentRef::parse(raw), 1)
    }

    async fn skipped(resolver: &DocumentResolver, raw: &str) -> SkipReason {
        match resolver.resolve(&reference(raw), CHECKLIST).await.unwrap() {
            Resolution::Skipped(reason) => reason,
            Resolution::Resolved(doc) => panic!("{} unexpectedly resolved to {:?}", raw, doc),
        }
    }

    #[tokio::test]
    async fn test_checklist_direct_path() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let resolution = resolver.resolve(&reference("pan"), CHECKLIST).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedDocument {
                display_name: "PAN Card".to_string(),
                order: 1,
                source_path: dir.path().join("pan.pdf"),
            })
        );
    }

    #[tokio::test]
    async fn test_checklist_file_record_keeps_checklist_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let Resolution::Resolved(doc) = resolver.resolve(&reference("gst"), CHECKLIST).await.unwrap() else {
            panic!("gst should resolve");
        };
        assert_eq!(doc.display_name, "GST Certificate");
        assert_eq!(doc.source_path, dir.path().join("gst.pdf"));
    }

    #[tokio::test]
    async fn test_numeric_id_falls_back_to_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        for raw in ["31", "additional_31"] {
            let Resolution::Resolved(doc) = resolver.resolve(&reference(raw), CHECKLIST).await.unwrap() else {
                panic!("{} should resolve through the file store", raw);
            };
            assert_eq!(doc.display_name, "Briefcase scan");
        }

        let raw_file = DocumentReference::new(DocumentRef::RawFile(31), 4);
        let Resolution::Resolved(doc) = resolver.resolve(&raw_file, CHECKLIST).await.unwrap() else {
            panic!("raw file should resolve");
        };
        assert_eq!(doc.order, 4);
    }

    #[tokio::test]
    async fn test_checklist_scope_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let other = resolver.resolve(&reference("pan"), CHECKLIST + 1).await.unwrap();
        assert_eq!(other, Resolution::Skipped(SkipReason::NotFound));
    }

    #[tokio::test]
    async fn test_skip_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        assert_eq!(skipped(&resolver, "unknown").await, SkipReason::NotFound);
        assert_eq!(skipped(&resolver, "999").await, SkipReason::NotFound);
        assert_eq!(skipped(&resolver, "empty").await, SkipReason::NoUsablePath);
        assert_eq!(skipped(&resolver, "32").await, SkipReason::NoUsablePath);
        assert!(matches!(skipped(&resolver, "ghost").await, SkipReason::MissingFile(_)));
    }

    #[tokio::test]
    async fn test_oversized_ids_are_rejected_before_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        assert_eq!(
            skipped(&resolver, "2147483648").await,
            SkipReason::IdOutOfRange("2147483648".to_string())
        );
        assert_eq!(
            skipped(&resolver, "additional_99999999999999999999999").await,
            SkipReason::IdOutOfRange("99999999999999999999999".to_string())
        );
        assert!(matches!(skipped(&resolver, "0").await, SkipReason::IdOutOfRange(_)));

        let negative = DocumentReference::new(DocumentRef::LegacyPrefixed(-3), 1);
        assert_eq!(
            resolver.resolve(&negative, CHECKLIST).await.unwrap(),
            Resolution::Skipped(SkipReason::IdOutOfRange("-3".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolve_all_preserves_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path());

        let refs = vec![reference("gst"), reference("nope"), reference("pan")];
        let resolutions = resolver.resolve_all(&refs, CHECKLIST).await.unwrap();
        let ids: Vec<String> = resolutions.iter().map(|(r, _)| r.id.to_string()).collect();
        assert_eq!(ids, vec!["gst", "nope", "pan"]);
        assert!(matches!(resolutions[1].1, Resolution::Skipped(SkipReason::NotFound)));
    }
}
