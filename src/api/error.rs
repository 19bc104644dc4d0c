use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;

use crate::core::PipelineError;

#[derive(Debug)]
pub struct ApiError {
    message: String,
    kind: &'static str,
    status_code: StatusCode,
}

impl ApiError {
    pub fn new(message: impl Into<String>, kind: &'static str, status_code: StatusCode) -> Self {
        ApiError {
            message: message.into(),
            kind,
            status_code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, "invalid_request", StatusCode::BAD_REQUEST)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code).json(serde_json::json!({
            "error": self.message,
            "kind": self.kind,
            "status": self.status_code.as_u16()
        }))
    }

    fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status_code = match &err {
            PipelineError::NoValidDocuments | PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::SourceNotFound(_) | PipelineError::NoSourcesAvailable => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status_code.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "Pipeline operation failed");
        }
        ApiError::new(err.to_string(), err.kind(), status_code)
    }
}

impl From<actix_web::error::JsonPayloadError> for ApiError {
    fn from(err: actix_web::error::JsonPayloadError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
