use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use vdl_ledger::Ledger;

use crate::action_log::ActionLog;
use crate::classifier::{Classifier, CommandClassifier};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// VDL upload server.
pub struct VdlServer {
    config: ServerConfig,
}

impl VdlServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the store, initialize the ledger and wire up handler state
    /// using the configured command classifier.
    pub fn build_state(&self) -> ServerResult<AppState> {
        let classifier = Arc::new(CommandClassifier::from_config(&self.config.classifier));
        self.build_state_with(classifier)
    }

    /// Like [`build_state`](Self::build_state) with a caller-supplied
    /// classifier.
    pub fn build_state_with(&self, classifier: Arc<dyn Classifier>) -> ServerResult<AppState> {
        let ledger = Ledger::new(self.config.open_store()?);
        ledger.initialize()?;

        Ok(AppState {
            ledger: Arc::new(ledger),
            classifier,
            action_log: Arc::new(ActionLog::new(self.config.action_log_path())),
            upload: self.config.upload.clone(),
        })
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.build_state()?))
    }

    /// Serve until ctrl-c, then flush the store.
    pub async fn serve(self) -> ServerResult<()> {
        let state = self.build_state()?;
        let ledger = Arc::clone(&state.ledger);
        let app = build_router(state);

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("VDL server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        match Arc::try_unwrap(ledger) {
            Ok(ledger) => ledger.shutdown()?,
            Err(shared) => {
                warn!("ledger still shared at shutdown; syncing store only");
                shared.store().sync()?;
            }
        }
        info!("VDL server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
