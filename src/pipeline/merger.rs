use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::core::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::CompiledArtifact;
use crate::pdf::{concat_documents, load_document, page_count, save_document};
use crate::storage::paths::ensure_fresh_output;

const CHUNK_SIZE: usize = 64 * 1024;

/// Concatenates already compiled outputs into a single bundle.
pub struct Merger {
    metrics: Arc<PipelineMetrics>,
}

impl Merger {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Merger { metrics }
    }

    /// Missing or unreadable sources are left out; the rest keep list order.
    /// The bundle must go to a new file that is none of the sources.
    pub fn merge(&self, source_paths: &[PathBuf], output_path: &Path) -> PipelineResult<CompiledArtifact> {
        ensure_fresh_output(output_path, source_paths.iter().map(PathBuf::as_path))?;

        let mut documents = Vec::with_capacity(source_paths.len());
        for path in source_paths {
            if !path.is_file() {
                tracing::warn!(path = %path.display(), "Merge source missing, skipping");
                continue;
            }
            match load_document(path) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Merge source unreadable, skipping"),
            }
        }

        if documents.is_empty() {
            return Err(PipelineError::NoSourcesAvailable);
        }

        let merged_count = documents.len();
        let mut bundle = concat_documents(documents)?;
        let file_size_bytes = save_document(&mut bundle, output_path)?;
        self.metrics.merges.inc();

        let artifact = CompiledArtifact {
            file_path: output_path.to_path_buf(),
            file_size_bytes,
            page_count: page_count(&bundle),
            created_at: Utc::now(),
        };
        tracing::info!(
            sources = merged_count,
            requested = source_paths.len(),
            pages = artifact.page_count,
            path = %artifact.file_path.display(),
            "Merged bundle written"
        );
        Ok(artifact)
    }
}

/// Streams the file at `path` and deletes it once the last chunk has been
/// read, or when `grace` elapses, whichever happens first.
pub async fn stream_and_discard(
    path: PathBuf,
    grace: Duration,
) -> PipelineResult<impl Stream<Item = Result<Bytes, std::io::Error>>> {
    let file = tokio::fs::File::open(&path).await?;

    let expiring = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        remove_quietly(&expiring).await;
    });

    Ok(futures::stream::unfold(Some((file, path)), |state| async move {
        let (mut file, path) = state?;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        match file.read(&mut chunk).await {
            Ok(0) => {
                drop(file);
                remove_quietly(&path).await;
                None
            }
            Ok(read) => {
                chunk.truncate(read);
                Some((Ok(Bytes::from(chunk)), Some((file, path))))
            }
            Err(e) => {
                drop(file);
                remove_quietly(&path).await;
                Some((Err(e), None))
            }
        }
    }))
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed transient bundle"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove transient bundle"),
    }
}
