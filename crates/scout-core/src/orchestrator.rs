//! Conversation orchestrator — the canonical research loop.
//!
//! Drives one session: invoke the current agent with the full conversation
//! history, classify the result, update the history, repeat until a terminal
//! report is produced. Clarification requests suspend the loop in the broker;
//! handoffs move `current_agent`; continuations append a synthetic user turn.
//!
//! The loop suspends at exactly two points: awaiting an agent invocation and
//! awaiting a clarification answer. The session history has a single writer —
//! this loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::agents::outputs::{ClarificationRequest, ReportData, WebSearchPlan};
use crate::agents::{AgentRegistry, RegistryError, SEARCH};
use crate::classify::{classify, TurnOutcome};
use crate::clarify::{BrokerError, ClarificationBroker};
use crate::notify::ProgressSink;
use crate::runtime::{AgentRuntime, RuntimeError};
use crate::session::{Session, SessionStatus, Turn};

/// Hard bound on loop iterations; exceeding it fails the session.
pub const DEFAULT_MAX_TURNS: usize = 25;

const CONTINUE_PROMPT: &str = "Continue the research based on your previous result.";

/// Configuration for one orchestrator run.
pub struct OrchestratorConfig {
    pub session_id: String,
    /// Agent that receives the opening query.
    pub entry_agent: String,
    pub max_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            entry_agent: crate::agents::ORCHESTRATOR.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// Shared services the orchestrator needs.
pub struct OrchestratorServices {
    pub runtime: Arc<dyn AgentRuntime>,
    pub registry: Arc<AgentRegistry>,
    pub broker: Arc<ClarificationBroker>,
    pub sink: ProgressSink,
}

/// A completed run: the terminal report plus the session it came from
/// (consumed by report assembly for the reflection pass and transcript).
#[derive(Debug)]
pub struct RunOutcome {
    pub session: Session,
    pub report: ReportData,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("agent '{agent}' invocation failed: {source}")]
    AgentFailed {
        agent: String,
        #[source]
        source: RuntimeError,
    },

    #[error("research did not converge within {0} turns")]
    TurnLimitExceeded(usize),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// The research orchestrator — runs the complete loop for one session.
pub struct ResearchOrchestrator {
    services: OrchestratorServices,
    config: OrchestratorConfig,
}

impl ResearchOrchestrator {
    pub fn new(services: OrchestratorServices, config: OrchestratorConfig) -> Self {
        Self { services, config }
    }

    /// Run the loop to completion. On failure the session ends in `Failed`
    /// and a terminal `done=true` error event is emitted — the session never
    /// goes silent. No automatic retry: agent invocations are costly and
    /// non-idempotent.
    pub async fn run(&self, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let mut session = Session::new(&self.config.session_id, query);
        self.services.sink.emit("starting", "Starting research...", true);

        match self.drive(&mut session).await {
            Ok(report) => {
                session.status = SessionStatus::Done;
                Ok(RunOutcome { session, report })
            }
            Err(e) => {
                session.status = SessionStatus::Failed;
                tracing::error!(
                    session_id = %self.config.session_id,
                    "research session failed: {e}"
                );
                self.services
                    .sink
                    .emit("error", format!("Research failed: {e}"), true);
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut Session) -> Result<ReportData, OrchestratorError> {
        let mut current = self.config.entry_agent.clone();

        for turn in 1..=self.config.max_turns {
            let descriptor = self.services.registry.resolve(&current)?;
            tracing::debug!(
                session_id = %session.session_id,
                turn,
                agent = %current,
                history_len = session.history.len(),
                "invoking agent"
            );
            self.services
                .sink
                .emit("agent", format!("Consulting {} agent...", current), false);

            let outcome = self
                .services
                .runtime
                .invoke(descriptor, &session.history)
                .await
                .map_err(|source| OrchestratorError::AgentFailed {
                    agent: current.clone(),
                    source,
                })?;

            match classify(&outcome, &current, &self.services.registry) {
                TurnOutcome::Clarification(request) => {
                    session.status = SessionStatus::AwaitingClarification;
                    self.services.sink.emit(
                        "clarifying",
                        "Waiting for clarification from the user...",
                        false,
                    );
                    let answer = self
                        .services
                        .broker
                        .request(&session.session_id, &self.services.sink, &request.questions)
                        .await?;
                    session.push_assistant(render_clarification(&request));
                    session.push_user(answer);
                    session.status = SessionStatus::Running;
                    self.services
                        .sink
                        .emit("clarifying", "Clarification received", true);
                    // Same agent resumes with the richer context.
                }
                TurnOutcome::Report(report) => {
                    self.services.sink.emit(
                        "agent",
                        format!("{} agent produced the final report", current),
                        true,
                    );
                    return Ok(report);
                }
                TurnOutcome::Handoff { agent } => {
                    session.push_assistant(render_payload(&outcome.payload));
                    self.services.sink.emit(
                        "handoff",
                        format!("{} handed off to {}", current, agent),
                        true,
                    );
                    current = agent;
                }
                TurnOutcome::Continuation { payload } => {
                    session.push_assistant(render_payload(&payload));
                    if let Some(plan) = parse_search_plan(&payload) {
                        let results = self.perform_searches(&plan).await?;
                        session.push_user(format!(
                            "Summarized search results:\n\n{}",
                            results.join("\n\n---\n\n")
                        ));
                    } else {
                        session.push_user(CONTINUE_PROMPT);
                    }
                }
            }
        }

        Err(OrchestratorError::TurnLimitExceeded(self.config.max_turns))
    }

    /// Execute every planned search concurrently against the search agent.
    /// All sub-tasks settle before the combined result is assembled; an
    /// individual failure skips that item rather than aborting the turn.
    async fn perform_searches(
        &self,
        plan: &WebSearchPlan,
    ) -> Result<Vec<String>, OrchestratorError> {
        let search_agent = self.services.registry.resolve(SEARCH)?;
        let total = plan.searches.len();
        let completed = AtomicUsize::new(0);

        self.services.sink.emit("searching", "Searching...", false);

        let tasks = plan.searches.iter().enumerate().map(|(idx, item)| {
            let sink = &self.services.sink;
            let runtime = &self.services.runtime;
            let completed = &completed;
            async move {
                let key = format!("search_{}", idx + 1);
                sink.emit(&key, format!("Searching: {}", item.query), false);

                let input = format!(
                    "Search term: {}\nReason for searching: {}",
                    item.query, item.reason
                );
                let history = [Turn::user(input)];
                let result = runtime.invoke(search_agent, &history).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                sink.emit(
                    "searching",
                    format!("Searching... {}/{} completed", done, total),
                    false,
                );

                match result {
                    Ok(outcome) => {
                        sink.emit(&key, format!("Completed search: {}", item.query), true);
                        Some(render_payload(&outcome.payload))
                    }
                    Err(e) => {
                        tracing::warn!(query = %item.query, "search sub-task failed: {e}");
                        sink.emit(&key, format!("Search failed: {} - {}", item.query, e), true);
                        None
                    }
                }
            }
        });

        let results: Vec<String> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect();

        self.services.sink.emit(
            "searching",
            format!("Searching done: {}/{} succeeded", results.len(), total),
            true,
        );
        Ok(results)
    }
}

fn parse_search_plan(payload: &Value) -> Option<WebSearchPlan> {
    serde_json::from_value::<WebSearchPlan>(payload.clone())
        .ok()
        .filter(|plan| !plan.searches.is_empty())
}

/// Render a structured payload as conversation text. Prefers the payload's
/// own summary when one is present.
fn render_payload(payload: &Value) -> String {
    if let Some(summary) = payload.get("summary").and_then(Value::as_str) {
        return summary.to_string();
    }
    match payload {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn render_clarification(request: &ClarificationRequest) -> String {
    let mut text = String::from("I need clarification before continuing:\n");
    for question in &request.questions {
        text.push_str(&format!("- {}\n", question));
    }
    if !request.context.is_empty() {
        text.push_str(&format!("\nContext: {}", request.context));
    }
    text
}
