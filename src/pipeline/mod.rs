pub mod compiler;
pub mod compressor;
pub mod index;
pub mod merger;
pub mod resolver;
pub mod stamp;

pub use compiler::Compiler;
pub use compressor::{CompressionStrategy, Compressor, GhostscriptStrategy, ReencodeStrategy};
pub use merger::{stream_and_discard, Merger};
pub use resolver::{DocumentResolver, Resolution};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{IndexLayout, PipelineConfig, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::{
    CompilationReport, CompilationRequest, CompiledArtifact, CompressionProfile, CompressionResult,
    MergeRequest,
};
use crate::storage::paths::timestamped_path;
use crate::storage::{DocumentRegistry, PathResolver};

/// Entry point for the three operations the service exposes.
pub struct Pipeline {
    compiler: Compiler,
    compressor: Arc<Compressor>,
    merger: Arc<Merger>,
    output_dir: PathBuf,
    merge_grace: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        registry: Arc<dyn DocumentRegistry>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let resolver = DocumentResolver::new(
            registry,
            PathResolver::new(&config.storage_root),
            config.max_file_id,
        );

        Pipeline {
            compiler: Compiler::new(
                resolver,
                &config.output_dir,
                IndexLayout::default(),
                Arc::clone(&metrics),
            ),
            compressor: Arc::new(Compressor::with_ghostscript(
                &config.ghostscript_binary,
                Arc::clone(&metrics),
            )),
            merger: Arc::new(Merger::new(Arc::clone(&metrics))),
            output_dir: config.output_dir.clone(),
            merge_grace: Duration::from_secs(config.merge_grace_seconds),
            metrics,
        }
    }

    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn merge_grace(&self) -> Duration {
        self.merge_grace
    }

    pub async fn compile(&self, request: CompilationRequest) -> PipelineResult<CompilationReport> {
        self.compiler.compile(request).await
    }

    pub async fn compress(
        &self,
        input: PathBuf,
        profile: CompressionProfile,
    ) -> PipelineResult<CompressionResult> {
        let compressor = Arc::clone(&self.compressor);
        tokio::task::spawn_blocking(move || compressor.compress(&input, profile)).await?
    }

    /// Writes the bundle under the output directory unless the request names
    /// a destination.
    pub async fn merge(&self, request: MergeRequest) -> PipelineResult<CompiledArtifact> {
        let output_path = request
            .output_path
            .unwrap_or_else(|| timestamped_path(&self.output_dir, "merged_bundle"));
        let merger = Arc::clone(&self.merger);
        let sources = request.source_paths;
        tokio::task::spawn_blocking(move || merger.merge(&sources, &output_path)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChecklistDocument, DocumentLocation, DocumentRef, DocumentReference, ResponseType};
    use crate::pdf::fixtures::write_labelled_pdf;
    use crate::storage::InMemoryRegistry;

    fn pipeline(root: &std::path::Path) -> Pipeline {
        write_labelled_pdf(&root.join("a.pdf"), "A", 2);
        let mut registry = InMemoryRegistry::new();
        registry.insert_checklist_document(ChecklistDocument {
            id: "a".to_string(),
            checklist_id: 1,
            display_name: "A".to_string(),
            location: DocumentLocation::DirectPath("a.pdf".to_string()),
        });

        let config = PipelineConfig {
            storage_root: root.to_path_buf(),
            output_dir: root.join("out"),
            ghostscript_binary: "/nonexistent/gs".to_string(),
            merge_grace_seconds: 5,
            ..PipelineConfig::default()
        };
        Pipeline::new(&config, Arc::new(registry), Arc::new(PipelineMetrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_compile_compress_merge() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let request = CompilationRequest::new(
            1,
            "Bid",
            ResponseType::Financial,
            1,
            vec![DocumentReference::new(DocumentRef::parse("a"), 1)],
        );
        let report = pipeline.compile(request).await.unwrap();
        assert!(report.artifact.file_path.starts_with(dir.path().join("out")));
        assert_eq!(pipeline.metrics().compilations.get(), 1);

        let compressed = pipeline
            .compress(report.artifact.file_path.clone(), CompressionProfile::Light)
            .await
            .unwrap();
        assert!(compressed.method_used.starts_with("reencode"));

        let merged = pipeline
            .merge(MergeRequest {
                source_paths: vec![report.artifact.file_path.clone(), compressed.output_path.clone()],
                output_path: None,
            })
            .await
            .unwrap();
        assert_eq!(merged.page_count, 4);
        assert_eq!(pipeline.merge_grace(), Duration::from_secs(5));
    }
}
