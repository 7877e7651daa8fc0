use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use vdl_ledger::LedgerError;
use vdl_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad upload: {0}")]
    BadUpload(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("classifier timed out after {0:?}")]
    ClassifierTimeout(Duration),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadUpload(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedFile(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Classifier(_) => StatusCode::BAD_GATEWAY,
            Self::ClassifierTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Ledger(LedgerError::NotInitialized) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ledger(_)
            | Self::Store(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
