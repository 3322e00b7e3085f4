//! Application state shared across all request handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::pipeline::PipelineBackends;

/// Boxed future resolving to a run's backends.
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = PipelineResult<PipelineBackends>> + Send + 'a>>;

/// Builds the backends for each new run.
pub trait BackendConnector: Send + Sync {
    /// Connect the store, fetcher and completion client for `config`.
    fn connect<'a>(&'a self, config: &'a PipelineConfig) -> ConnectFuture<'a>;
}

/// Connector for the production backends.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiveBackends;

impl BackendConnector for LiveBackends {
    fn connect<'a>(&'a self, config: &'a PipelineConfig) -> ConnectFuture<'a> {
        Box::pin(PipelineBackends::connect(config))
    }
}

/// The run currently owned by the controller.
struct ActiveRun {
    id: Uuid,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Public view of the active run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunInfo {
    /// Run id.
    pub id: Uuid,
    /// When the run was started.
    pub started_at: DateTime<Utc>,
}

/// Owner of the single active run.
#[derive(Default)]
pub struct RunController {
    active: Mutex<Option<ActiveRun>>,
    /// Serializes `start` so two replacements cannot interleave.
    starting: Mutex<()>,
}

impl RunController {
    /// Create a controller with no active run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any active run and wait for it to exit, then spawn the future
    /// built by `make` as the new one.
    pub async fn start<F, Fut>(&self, make: F) -> Uuid
    where
        F: FnOnce(Uuid, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let _starting = self.starting.lock().await;

        // The lock on `active` is released before waiting: the exiting run
        // calls `finish`, which takes it.
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            info!(run_id = %previous.id, "Cancelling the current run");
            previous.cancel.cancel();
            if let Err(err) = previous.handle.await {
                warn!(run_id = %previous.id, error = %err, "Previous run ended abnormally");
            }
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(make(id, cancel.clone()));
        *self.active.lock().await = Some(ActiveRun {
            id,
            started_at: Utc::now(),
            cancel,
            handle,
        });
        id
    }

    /// Cancel the active run, returning its id.
    pub async fn terminate(&self) -> Option<Uuid> {
        let previous = self.active.lock().await.take()?;
        info!(run_id = %previous.id, "Terminating run");
        previous.cancel.cancel();
        Some(previous.id)
    }

    /// The active run, if it is still going.
    pub async fn active(&self) -> Option<RunInfo> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|run| !run.handle.is_finished())
            .map(|run| RunInfo {
                id: run.id,
                started_at: run.started_at,
            })
    }

    /// Id of the active run, if it is still going.
    pub async fn active_id(&self) -> Option<Uuid> {
        self.active().await.map(|run| run.id)
    }

    /// Forget run `id` once it has ended; a newer run is left alone.
    pub async fn finish(&self, id: Uuid) {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| run.id == id) {
            *active = None;
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Configuration each run starts from.
    pub config: PipelineConfig,
    /// Single-run controller.
    pub controller: RunController,
    connector: Arc<dyn BackendConnector>,
}

impl AppState {
    /// Create state running against the production backends.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Arc<Self> {
        Self::with_connector(config, Arc::new(LiveBackends))
    }

    /// Create state with a custom backend connector.
    #[must_use]
    pub fn with_connector(config: PipelineConfig, connector: Arc<dyn BackendConnector>) -> Arc<Self> {
        Arc::new(Self {
            config,
            controller: RunController::new(),
            connector,
        })
    }

    /// Connect backends for a new run.
    ///
    /// # Errors
    /// Returns an error if any backend cannot be built.
    pub async fn connect(&self) -> PipelineResult<PipelineBackends> {
        self.connector.connect(&self.config).await
    }
}
