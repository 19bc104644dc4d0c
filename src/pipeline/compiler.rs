use chrono::Utc;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::{build_index_document, IndexEntry};
use super::resolver::{DocumentResolver, Resolution};
use super::stamp::apply_stamp;
use crate::core::{DocumentMetadata, IndexLayout, PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::{
    CompilationReport, CompilationRequest, CompiledArtifact, ItemOutcome, Outcome, ResolvedDocument,
    SkipReason,
};
use crate::pdf::builder::set_metadata;
use crate::pdf::image::{image_document, is_image_path};
use crate::pdf::{concat_documents, load_document, page_count, save_document};
use crate::storage::paths::{ensure_fresh_output, timestamped_path};

/// Builds one tender response PDF out of its referenced documents.
pub struct Compiler {
    resolver: DocumentResolver,
    output_dir: PathBuf,
    layout: IndexLayout,
    metrics: Arc<PipelineMetrics>,
}

impl Compiler {
    pub fn new(
        resolver: DocumentResolver,
        output_dir: impl Into<PathBuf>,
        layout: IndexLayout,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Compiler {
            resolver,
            output_dir: output_dir.into(),
            layout,
            metrics,
        }
    }

    pub async fn compile(&self, request: CompilationRequest) -> PipelineResult<CompilationReport> {
        if request.index_start_from < 1 {
            return Err(PipelineError::InvalidRequest(format!(
                "index_start_from must be at least 1, got {}",
                request.index_start_from
            )));
        }
        tracing::info!(
            tender_id = request.tender_id,
            response = %request.response_name,
            response_type = %request.response_type,
            documents = request.documents.len(),
            "Compiling tender response"
        );

        let resolutions = self
            .resolver
            .resolve_all(&request.documents, request.checklist_id)
            .await?;

        let mut outcomes = Vec::with_capacity(resolutions.len());
        let mut resolved = Vec::new();
        for (reference, resolution) in resolutions {
            let outcome = match resolution {
                Resolution::Resolved(document) => {
                    resolved.push((outcomes.len(), document));
                    Outcome::Included
                }
                Resolution::Skipped(reason) => Outcome::Skipped(reason),
            };
            outcomes.push(ItemOutcome {
                reference: reference.id.to_string(),
                order: reference.order,
                outcome,
            });
        }
        // Stable: equal orders keep request order.
        resolved.sort_by_key(|(_, document)| document.order);

        let output_path = match &request.output_path {
            Some(path) => {
                ensure_fresh_output(path, resolved.iter().map(|(_, d)| d.source_path.as_path()))?;
                path.clone()
            }
            None => timestamped_path(
                &self.output_dir,
                &format!("tender_{}_{}", request.tender_id, request.response_type),
            ),
        };
        let request = Arc::new(request);
        let layout = self.layout.clone();

        let job = {
            let request = Arc::clone(&request);
            let output_path = output_path.clone();
            move || assemble(&request, resolved, &layout, &output_path)
        };
        let assembled = tokio::task::spawn_blocking(job).await??;

        for (position, reason) in assembled.unreadable {
            outcomes[position].outcome = Outcome::Skipped(reason);
        }
        for reason in outcomes.iter().filter_map(|o| o.outcome.skip_reason()) {
            self.metrics.record_skip(reason);
        }
        self.metrics.compilations.inc();

        let report = CompilationReport {
            artifact: assembled.artifact,
            documents: outcomes,
            index_pages: assembled.index_pages,
            stamp: assembled.stamp,
        };
        tracing::info!(
            tender_id = request.tender_id,
            path = %report.artifact.file_path.display(),
            pages = report.artifact.page_count,
            bytes = report.artifact.file_size_bytes,
            included = report.included_count(),
            skipped = report.documents.len() - report.included_count(),
            "Compilation completed"
        );
        Ok(report)
    }
}

struct Assembled {
    artifact: CompiledArtifact,
    index_pages: usize,
    stamp: Outcome,
    /// Outcome positions of sources that resolved but could not be read.
    unreadable: Vec<(usize, SkipReason)>,
}

fn assemble(
    request: &CompilationRequest,
    resolved: Vec<(usize, ResolvedDocument)>,
    layout: &IndexLayout,
    output_path: &Path,
) -> PipelineResult<Assembled> {
    let mut unreadable = Vec::new();
    let mut sources = Vec::with_capacity(resolved.len());
    let mut entries = Vec::with_capacity(resolved.len());

    for (position, document) in resolved {
        match open_source(&document.source_path) {
            Ok(doc) => {
                entries.push(IndexEntry::new(document.order, document.display_name));
                sources.push(doc);
            }
            Err(e) => {
                tracing::warn!(
                    path = %document.source_path.display(),
                    error = %e,
                    "Dropping unreadable document"
                );
                unreadable.push((position, SkipReason::Unreadable(e.to_string())));
            }
        }
    }

    if sources.is_empty() {
        tracing::error!(tender_id = request.tender_id, "No valid documents to compile");
        return Err(PipelineError::NoValidDocuments);
    }

    let mut index_pages = 0;
    let mut parts = Vec::with_capacity(sources.len() + 1);
    if request.include_index {
        let index = build_index_document(
            &request.index_title(),
            &entries,
            request.index_start_from,
            layout,
        )?;
        index_pages = page_count(&index);
        parts.push(index);
    }
    parts.extend(sources);

    let mut combined = concat_documents(parts)?;
    let stamp = apply_stamp(&mut combined, request.stamp.as_ref(), index_pages);

    let mut metadata =
        DocumentMetadata::new(&request.response_name).with_subject(request.response_type.to_string());
    if let Some(remarks) = request.remarks.as_deref().filter(|r| !r.trim().is_empty()) {
        metadata = metadata.with_keywords(vec![remarks.trim().to_string()]);
    }
    set_metadata(&mut combined, &metadata);

    let file_size_bytes = save_document(&mut combined, output_path)?;
    Ok(Assembled {
        artifact: CompiledArtifact {
            file_path: output_path.to_path_buf(),
            file_size_bytes,
            page_count: page_count(&combined),
            created_at: Utc::now(),
        },
        index_pages,
        stamp,
        unreadable,
    })
}

fn open_source(path: &Path) -> PipelineResult<Document> {
    if is_image_path(path) {
        image_document(path)
    } else {
        load_document(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChecklistDocument, DocumentLocation, DocumentRef, DocumentReference, FileRecord, ResponseType,
        StampOptions,
    };
    use crate::pdf::fixtures::{first_texts, page_texts, write_labelled_pdf};
    use crate::storage::{InMemoryRegistry, PathResolver};

    const CHECKLIST: i64 = 3;

    fn checklist_doc(id: &str, name: &str, path: &str) -> ChecklistDocument {
        ChecklistDocument {
            id: id.to_string(),
            checklist_id: CHECKLIST,
            display_name: name.to_string(),
            location: DocumentLocation::DirectPath(path.to_string()),
        }
    }

    fn compiler(dir: &Path, registry: InMemoryRegistry) -> Compiler {
        let resolver = DocumentResolver::new(Arc::new(registry), PathResolver::new(dir), i32::MAX as i64);
        Compiler::new(
            resolver,
            dir.join("compiled"),
            IndexLayout::default(),
            Arc::new(PipelineMetrics::new().unwrap()),
        )
    }

    fn request(documents: Vec<DocumentReference>) -> CompilationRequest {
        CompilationRequest::new(11, "Bid", ResponseType::Technical, CHECKLIST, documents)
    }

    fn reference(id: &str, order: i64) -> DocumentReference {
        DocumentReference::new(DocumentRef::parse(id), order)
    }

    fn two_document_registry(dir: &Path) -> InMemoryRegistry {
        write_labelled_pdf(&dir.join("a.pdf"), "A", 2);
        write_labelled_pdf(&dir.join("b.pdf"), "B", 1);
        let mut registry = InMemoryRegistry::new();
        registry
            .insert_checklist_document(checklist_doc("a", "A", "a.pdf"))
            .insert_checklist_document(checklist_doc("b", "B", "b.pdf"));
        registry
    }

    #[tokio::test]
    async fn test_index_then_documents_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = compiler(dir.path(), two_document_registry(dir.path()));

        let report = compiler
            .compile(request(vec![reference("a", 2), reference("b", 1)]).with_index(5))
            .await
            .unwrap();

        assert_eq!(report.index_pages, 1);
        assert_eq!(report.artifact.page_count, 4);
        assert!(report.artifact.file_path.starts_with(dir.path().join("compiled")));

        let output = load_document(&report.artifact.file_path).unwrap();
        let texts = page_texts(&output);
        assert_eq!(texts[0], vec!["Bid (Technical)", "5. B", "6. A"]);
        assert_eq!(first_texts(&output)[1..].to_vec(), vec!["B-1", "A-1", "A-2"]);
        assert_eq!(
            report.artifact.file_size_bytes,
            std::fs::metadata(&report.artifact.file_path).unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_unresolvable_references_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = two_document_registry(dir.path());
        std::fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();
        registry.insert_checklist_document(checklist_doc("broken", "Broken", "broken.pdf"));
        let compiler = compiler(dir.path(), registry);

        let report = compiler
            .compile(request(vec![
                reference("missing", 1),
                reference("a", 2),
                reference("broken", 3),
            ]))
            .await
            .unwrap();

        let outcomes: Vec<&Outcome> = report.documents.iter().map(|d| &d.outcome).collect();
        assert_eq!(outcomes[0], &Outcome::Skipped(SkipReason::NotFound));
        assert_eq!(outcomes[1], &Outcome::Included);
        assert!(matches!(outcomes[2], Outcome::Skipped(SkipReason::Unreadable(_))));
        assert_eq!(report.included_count(), 1);
        assert_eq!(report.stamp, Outcome::Skipped(SkipReason::NoStampConfigured));
        assert_eq!(
            compiler.metrics.documents_skipped.with_label_values(&["not_found"]).get(),
            1
        );

        let output = load_document(&report.artifact.file_path).unwrap();
        assert_eq!(first_texts(&output), vec!["A-1", "A-2"]);
    }

    #[tokio::test]
    async fn test_nothing_usable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = compiler(dir.path(), InMemoryRegistry::new());

        let err = compiler
            .compile(request(vec![reference("x", 1), reference("42", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoValidDocuments));
        assert!(!dir.path().join("compiled").exists());
    }

    #[tokio::test]
    async fn test_image_sources_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(60, 40, image::Rgb([200, 10, 10]))
            .save(dir.path().join("photo.png"))
            .unwrap();
        write_labelled_pdf(&dir.path().join("a.pdf"), "A", 1);

        let mut registry = InMemoryRegistry::new();
        registry
            .insert_checklist_document(checklist_doc("a", "A", "a.pdf"))
            .insert_file(FileRecord {
                id: 9,
                display_name: "Site photo".to_string(),
                stored_path: Some("photo.png".to_string()),
            });
        let compiler = compiler(dir.path(), registry);

        let output_path = dir.path().join("out/bid.pdf");
        let mut req = request(vec![reference("a", 1), reference("additional_9", 2)])
            .with_output_path(&output_path);
        req.remarks = Some("final".to_string());
        let report = compiler.compile(req).await.unwrap();

        assert_eq!(report.artifact.file_path, output_path);
        assert_eq!(report.artifact.page_count, 2);

        let output = load_document(&output_path).unwrap();
        let info_id = output.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = output.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Bid");
        assert_eq!(info.get(b"Subject").unwrap().as_str().unwrap(), b"Technical");
        assert_eq!(info.get(b"Keywords").unwrap().as_str().unwrap(), b"final");
    }

    #[tokio::test]
    async fn test_output_path_may_not_replace_a_source() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = compiler(dir.path(), two_document_registry(dir.path()));

        let err = compiler
            .compile(request(vec![reference("a", 1), reference("b", 2)]).with_output_path(dir.path().join("b.pdf")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
        assert_eq!(page_count(&load_document(&dir.path().join("b.pdf")).unwrap()), 1);

        let target = dir.path().join("bid.pdf");
        compiler
            .compile(request(vec![reference("a", 1)]).with_output_path(&target))
            .await
            .unwrap();
        let err = compiler
            .compile(request(vec![reference("b", 1)]).with_output_path(&target))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_index_start_must_be_positive() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = compiler(dir.path(), two_document_registry(dir.path()));

        for start in [0, -3, i64::MIN] {
            let err = compiler
                .compile(request(vec![reference("a", 1)]).with_index(start))
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidRequest(_)), "start {}", start);
        }

        let err = compiler
            .compile(request(vec![reference("a", 1), reference("b", 2)]).with_index(i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
        assert_eq!(compiler.metrics.compilations.get(), 0);
    }

    #[tokio::test]
    async fn test_stamp_outcome_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = compiler(dir.path(), two_document_registry(dir.path()));

        let seal = dir.path().join("seal.png");
        image::RgbaImage::from_pixel(20, 20, image::Rgba([0, 0, 0, 128]))
            .save(&seal)
            .unwrap();
        let stamped = compiler
            .compile(request(vec![reference("a", 1)]).with_stamp(StampOptions::new(&seal)))
            .await
            .unwrap();
        assert_eq!(stamped.stamp, Outcome::Included);

        let broken = compiler
            .compile(request(vec![reference("a", 1)]).with_stamp(StampOptions::new(dir.path().join("none.png"))))
            .await
            .unwrap();
        assert!(matches!(broken.stamp, Outcome::Skipped(SkipReason::StampUnreadable(_))));
        assert_eq!(broken.artifact.page_count, 2);
    }
}
