use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    InvalidRequest,
    Credential,
    Transport,
    BackendStatus,
    ProtocolViolation,
    StructuredParse,
    CacheStorage,
    Document,
    Internal,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
    pub model: Option<String>,
    pub http_status: Option<u16>,
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            model: None,
            http_status: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl From<CacheFailure> for ExtractionError {
    fn from(failure: CacheFailure) -> Self {
        cache_storage(failure.to_string())
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(err: std::io::Error) -> Self {
        cache_storage(format!("cache storage error: {err}"))
    }
}

pub fn invalid_request(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::InvalidRequest, message)
}

pub fn credential_error(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::Credential, message)
}

pub fn transport_failed(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::Transport, message)
}

pub fn protocol_violation(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::ProtocolViolation, message)
}

pub fn structured_parse_failed(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::StructuredParse, message)
}

pub fn cache_storage(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::CacheStorage, message)
}

pub fn document_error(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::Document, message)
}

pub fn internal_error(message: impl Into<String>) -> ExtractionError {
    ExtractionError::new(ExtractionErrorKind::Internal, message)
}
