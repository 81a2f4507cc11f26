//! Research job intake.
//!
//! `POST /api/research` validates the request, takes the per-session job
//! lock, and spawns the research loop in the background. Everything after
//! the `202`-style acknowledgement flows over the session WebSocket.

use axum::{extract::State, routing::post, Json, Router};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use scout_core::agents::ORCHESTRATOR;
use scout_core::notify::ProgressSink;
use scout_core::orchestrator::{OrchestratorConfig, OrchestratorServices, ResearchOrchestrator};
use scout_core::report::ReportAssembler;

use crate::error::AppError;
use crate::types::{ResearchRequest, StartedResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/research", post(start_research))
}

async fn start_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<StartedResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("Query text is empty".to_string()));
    }
    if request.session_id.trim().is_empty() {
        return Err(AppError::BadRequest("session_id is required".to_string()));
    }

    let session_lock = {
        let mut locks = state.session_locks.write().await;
        locks
            .entry(request.session_id.clone())
            .or_default()
            .clone()
    };

    // Non-blocking: a held lock means a job is already running on this session.
    let guard = session_lock.try_lock_owned().map_err(|_| {
        AppError::Conflict(format!(
            "Session {} already has a research job in progress",
            request.session_id
        ))
    })?;

    let job_id = Uuid::new_v4().to_string();
    tracing::info!(
        session_id = %request.session_id,
        job_id = %job_id,
        "starting research job"
    );

    let session_id = request.session_id.clone();
    tokio::spawn(run_research_job(state, request.text, session_id, guard));

    Ok(Json(StartedResponse {
        status: "started",
        session_id: request.session_id,
        job_id,
    }))
}

/// Background body of one research job. Holds the session lock for its whole
/// duration; listeners may attach and detach freely while it runs.
async fn run_research_job(
    state: AppState,
    query: String,
    session_id: String,
    guard: OwnedMutexGuard<()>,
) {
    let sink = ProgressSink::spawn(session_id.clone(), state.channels.clone(), None);

    let orchestrator = ResearchOrchestrator::new(
        OrchestratorServices {
            runtime: state.runtime.clone(),
            registry: state.registry.clone(),
            broker: state.broker.clone(),
            sink: sink.clone(),
        },
        OrchestratorConfig {
            session_id: session_id.clone(),
            entry_agent: ORCHESTRATOR.to_string(),
            max_turns: state.config.max_turns,
        },
    );

    match orchestrator.run(&query).await {
        Ok(outcome) => {
            let assembler = ReportAssembler::new(
                state.runtime.clone(),
                state.registry.clone(),
                state.config.output_dir.clone(),
            );
            assembler.finalize(&outcome, &sink).await;
        }
        Err(e) => {
            // The orchestrator already emitted the terminal error event.
            tracing::error!(session_id = %session_id, "research job failed: {e}");
        }
    }

    sink.close().await;
    state.broker.clear_session(&session_id).await;
    // A listener that is still attached consumes the buffered result on its
    // own detach; with nobody attached the session is released here so the
    // channel and result maps do not grow across sessions.
    if !state.channels.has_listeners(&session_id).await {
        state.channels.remove_session(&session_id).await;
    }
    state.session_locks.write().await.remove(&session_id);
    drop(guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_core::agents::{builtin_registry, AgentDescriptor};
    use scout_core::clarify::ClarificationBroker;
    use scout_core::config::ScoutConfig;
    use scout_core::notify::ChannelRegistry;
    use scout_core::runtime::{AgentOutcome, AgentRuntime, RuntimeError};
    use scout_core::session::Turn;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    struct ImmediateReportRuntime;

    #[async_trait]
    impl AgentRuntime for ImmediateReportRuntime {
        async fn invoke(
            &self,
            agent: &AgentDescriptor,
            _history: &[Turn],
        ) -> Result<AgentOutcome, RuntimeError> {
            Ok(AgentOutcome {
                producing_agent: agent.name.clone(),
                payload: json!({ "short_summary": "s", "markdown_report": "# r" }),
            })
        }
    }

    fn state(output_dir: std::path::PathBuf) -> AppState {
        let config = ScoutConfig {
            output_dir,
            ..ScoutConfig::default()
        };
        let channels = Arc::new(ChannelRegistry::new());
        let broker = Arc::new(ClarificationBroker::new(
            channels.clone(),
            config.clarification_timeout(),
        ));
        AppState {
            config: Arc::new(config),
            registry: Arc::new(builtin_registry()),
            runtime: Arc::new(ImmediateReportRuntime),
            channels,
            broker,
            session_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[tokio::test]
    async fn busy_session_lock_rejects_second_take() {
        let lock = Arc::new(Mutex::new(()));
        let _held = lock.clone().try_lock_owned().unwrap();
        assert!(lock.clone().try_lock_owned().is_err());
    }

    #[tokio::test]
    async fn job_teardown_releases_channel_and_result_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path().to_path_buf());
        let session_id = "s1".to_string();

        let lock = Arc::new(Mutex::new(()));
        let guard = lock.clone().try_lock_owned().unwrap();
        state
            .session_locks
            .write()
            .await
            .insert(session_id.clone(), lock);

        run_research_job(state.clone(), "query".to_string(), session_id.clone(), guard).await;

        // Nothing buffered or registered survives a session with no listener.
        assert!(state.channels.take_result(&session_id).await.is_none());
        assert!(!state.channels.has_listeners(&session_id).await);
        assert!(state.session_locks.read().await.is_empty());
    }
}
