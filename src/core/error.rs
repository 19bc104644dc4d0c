use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no valid documents found for processing")]
    NoValidDocuments,

    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("none of the requested sources exist")]
    NoSourcesAvailable,

    #[error("compression failed (primary: {primary}; fallback: {fallback})")]
    CompressionFailed { primary: String, fallback: String },

    #[error("cannot write output {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("document has no pages: {}", .0.display())]
    EmptyDocument(PathBuf),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PipelineError {
    /// Stable machine-readable name, used by the API layer and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoValidDocuments => "no_valid_documents",
            PipelineError::SourceNotFound(_) => "source_not_found",
            PipelineError::NoSourcesAvailable => "no_sources_available",
            PipelineError::CompressionFailed { .. } => "compression_failed",
            PipelineError::OutputWriteFailure { .. } => "output_write_failure",
            PipelineError::ExternalTool { .. } => "external_tool",
            PipelineError::EmptyDocument(_) => "empty_document",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Registry(_) => "registry",
            PipelineError::Pdf(_) => "pdf",
            PipelineError::Image(_) => "image",
            PipelineError::Io(_) => "io",
            PipelineError::Config(_) => "config",
        }
    }

    pub fn external_tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::OutputWriteFailure {
            path: path.into(),
            source,
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(error: sqlx::Error) -> Self {
        PipelineError::Registry(error.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, error))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
