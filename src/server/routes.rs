//! HTTP route handlers for the control server.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::info;

use crate::pipeline::run_pipeline;
use crate::progress::{ChannelReporter, PipelineEvent, ProgressReporter};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/commence", get(commence))
        .route("/terminate", post(terminate))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active = state.controller.active().await;
    Json(serde_json::json!({
        "status": "ok",
        "service": "outreach-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "active_run": active,
    }))
}

/// Start a run, replacing any active one, and stream its log lines.
async fn commence(State(state): State<Arc<AppState>>) -> Response {
    let (tx, rx) = unbounded_channel::<String>();
    let task_state = Arc::clone(&state);

    let id = state
        .controller
        .start(move |id, cancel| async move {
            let reporter: Arc<dyn ProgressReporter> = Arc::new(ChannelReporter::new(tx.clone()));
            let exit = match task_state.connect().await {
                Ok(backends) => {
                    match run_pipeline(&task_state.config, backends, reporter, cancel).await {
                        Ok(summary) if summary.cancelled => "cancelled".to_string(),
                        Ok(_) => "success".to_string(),
                        Err(err) => format!("error: {err}"),
                    }
                }
                Err(err) => {
                    reporter.report(PipelineEvent::RunFailed {
                        error: err.to_string(),
                    });
                    format!("error: {err}")
                }
            };
            info!(run_id = %id, %exit, "Run exited");
            let _ = tx.send(format!("Run {id} exited with {exit}\n"));
            task_state.controller.finish(id).await;
        })
        .await;
    info!(run_id = %id, "Started run");

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(lines(rx)),
    )
        .into_response()
}

/// Cancel the active run, if any.
async fn terminate(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let terminated = state.controller.terminate().await;
    Json(serde_json::json!({ "terminated": terminated }))
}

/// Stream of log lines that ends once every sender is gone.
fn lines(
    rx: UnboundedReceiver<String>,
) -> impl futures::Stream<Item = Result<String, Infallible>> + Send + 'static {
    stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (Ok(line), rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{PromptBudget, TokenBudgeter};
    use crate::config::PipelineConfig;
    use crate::error::PipelineResult;
    use crate::fetch::ContentFetcher;
    use crate::llm::{CompletionClient, CompletionTransport, RetryPolicy};
    use crate::pipeline::PipelineBackends;
    use crate::server::state::{BackendConnector, ConnectFuture};
    use crate::sheets::{InMemoryRecordStore, RecordStore};
    use crate::testing::{FnTransport, StaticFetcher};

    struct FixedBackends(PipelineBackends);

    impl BackendConnector for FixedBackends {
        fn connect<'a>(&'a self, _config: &'a PipelineConfig) -> ConnectFuture<'a> {
            let backends = self.0.clone();
            Box::pin(async move { Ok(backends) })
        }
    }

    fn state() -> PipelineResult<Arc<AppState>> {
        let mut row = vec![String::new(); 15];
        row[0] = "Alice".into();
        row[3] = "acme.com".into();
        let store = InMemoryRecordStore::new()
            .with_range(
                "sheet-1",
                "Prompts!2:2",
                vec![vec!["s {{content}}".into(), "q".into(), "e".into(), "t".into()]],
            )
            .with_range("sheet-1", "Responses!A2:O", vec![row]);
        let transport: Arc<dyn CompletionTransport> =
            Arc::new(FnTransport::new(|_: &str| Ok("reply".to_string())));
        let client = CompletionClient::new(
            transport,
            TokenBudgeter::new()?,
            PromptBudget::new(128_000, 30_000),
            RetryPolicy::unbounded(),
        )?;
        let backends = PipelineBackends {
            store: Arc::new(store) as Arc<dyn RecordStore>,
            fetcher: Arc::new(StaticFetcher::new()) as Arc<dyn ContentFetcher>,
            client,
        };
        let config = PipelineConfig::new()
            .with_spreadsheet_id("sheet-1")
            .with_chunk_delay(std::time::Duration::ZERO);
        Ok(AppState::with_connector(config, Arc::new(FixedBackends(backends))))
    }

    #[tokio::test]
    async fn test_commence_streams_run_log() {
        let state = state().unwrap_or_else(|err| panic!("{err}"));
        let response = commence(State(Arc::clone(&state))).await;
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        let body = String::from_utf8(body.map(|b| b.to_vec()).unwrap_or_default()).unwrap_or_default();
        assert!(body.contains("Read 1 records"));
        assert!(body.contains("Finished processing all chunks"));
        assert!(body.trim_end().ends_with("exited with success"));
        assert_eq!(state.controller.active_id().await, None);
    }

    #[tokio::test]
    async fn test_terminate_when_idle() {
        let state = state().unwrap_or_else(|err| panic!("{err}"));
        let response = terminate(State(state)).await.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        let json: serde_json::Value = body
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or_default();
        assert!(json["terminated"].is_null());
    }
}
