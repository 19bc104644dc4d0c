pub mod api;
pub mod core;
pub mod metrics;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{PipelineConfig, PipelineError, PipelineResult};
pub use metrics::PipelineMetrics;
pub use models::{
    CompilationReport, CompilationRequest, CompiledArtifact, CompressionProfile, CompressionResult,
    DocumentRef, DocumentReference, MergeRequest, Outcome, SkipReason, StampOptions,
};
pub use pipeline::Pipeline;
pub use storage::{DocumentRegistry, InMemoryRegistry, SqliteRegistry};
