use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use vdl_ledger::{Ledger, LedgerResult, ValidationReport, VerdictSummary};
use vdl_store::BlockStore;
use vdl_types::{Block, Verdict};

use crate::action_log::{ActionEntry, ActionLog};
use crate::classifier::Classifier;
use crate::config::UploadConfig;
use crate::error::{ServerError, ServerResult};

/// Ledger over whichever backend the configuration selected.
pub type SharedLedger = Arc<Ledger<Box<dyn BlockStore>>>;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: SharedLedger,
    pub classifier: Arc<dyn Classifier>,
    pub action_log: Arc<ActionLog>,
    pub upload: UploadConfig,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub verdict: Verdict,
    pub block: Block,
    /// `None` when the action log could not be written; the block stands.
    pub action: Option<ActionEntry>,
}

/// Run a blocking ledger call off the async executor.
async fn with_ledger<T, F>(ledger: &SharedLedger, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Ledger<Box<dyn BlockStore>>) -> LedgerResult<T> + Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge
    } else {
        ServerError::BadUpload(err.body_text())
    }
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ledger_ready: state.ledger.is_ready(),
    })
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let blocks = with_ledger(&state.ledger, |l| l.len()).await?;
    Ok(Json(json!({
        "name": "vdl-server",
        "version": env!("CARGO_PKG_VERSION"),
        "blocks": blocks,
        "allowed_extensions": state.upload.allowed_extensions,
        "max_upload_bytes": state.upload.max_bytes,
    })))
}

/// Classify an uploaded clip and record the verdict.
///
/// Expects a multipart `file` field. The clip is held in memory only for
/// the duration of the request.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().trim().to_string();
        if filename.is_empty() {
            return Err(ServerError::BadUpload("no file selected".into()));
        }
        if !state.upload.is_allowed(&filename) {
            return Err(ServerError::UnsupportedFile(filename));
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ServerError::BadUpload("missing `file` part".into()))?;

    let verdict = state.classifier.classify(&bytes).await?;
    drop(bytes);

    let block = with_ledger(&state.ledger, move |l| l.record(&verdict)).await?;
    let action = match state.action_log.append(&filename, verdict.is_real()).await {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(
                filename = %filename,
                index = block.index,
                error = %e,
                "action log write failed"
            );
            None
        }
    };

    info!(
        filename = %filename,
        index = block.index,
        label = %block.label,
        "upload processed"
    );
    Ok(Json(UploadResponse {
        filename,
        verdict,
        block,
        action,
    }))
}

pub async fn chain_handler(State(state): State<AppState>) -> ServerResult<Json<Vec<Block>>> {
    with_ledger(&state.ledger, |l| l.history()).await.map(Json)
}

pub async fn block_handler(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> ServerResult<Json<Block>> {
    with_ledger(&state.ledger, move |l| l.block(index))
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("block {index}")))
}

/// Full validation report; always 200, validity is in the body.
pub async fn verify_handler(State(state): State<AppState>) -> ServerResult<Json<ValidationReport>> {
    with_ledger(&state.ledger, |l| l.validate()).await.map(Json)
}

pub async fn summary_handler(State(state): State<AppState>) -> ServerResult<Json<VerdictSummary>> {
    with_ledger(&state.ledger, |l| l.summary()).await.map(Json)
}

pub async fn logs_handler(State(state): State<AppState>) -> Json<Vec<ActionEntry>> {
    Json(state.action_log.entries().await)
}
