//! Agent invocation boundary.
//!
//! The LLM runtime is an external collaborator: "run agent X with this
//! conversation, get a structured payload back". `AgentRuntime` is the seam;
//! `HttpAgentRuntime` is the production implementation, tests swap in mocks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::agents::AgentDescriptor;
use crate::session::{Role, Turn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("runtime returned a malformed response: {0}")]
    Malformed(String),
}

/// Result of one agent invocation: the structured payload plus which agent
/// actually produced it (the runtime may have transferred control).
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub producing_agent: String,
    pub payload: Value,
}

/// The black-box text-generation capability behind every agent.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Invoke `agent` with the full ordered conversation history.
    async fn invoke(
        &self,
        agent: &AgentDescriptor,
        history: &[Turn],
    ) -> Result<AgentOutcome, RuntimeError>;
}

/// Configuration for the HTTP-backed runtime.
#[derive(Debug, Clone)]
pub struct HttpRuntimeConfig {
    /// Endpoint accepting agent invocation requests.
    pub endpoint: String,
    /// Model identifier forwarded with every request.
    pub model: String,
}

/// `AgentRuntime` implementation that POSTs invocations to a remote runtime
/// service and reads the structured outcome from its JSON response.
pub struct HttpAgentRuntime {
    client: reqwest::Client,
    config: HttpRuntimeConfig,
}

#[derive(Deserialize)]
struct RuntimeResponse {
    /// Agent that produced the output. Defaults to the requested agent when
    /// the runtime performed no handoff.
    agent: Option<String>,
    output: Value,
}

impl HttpAgentRuntime {
    pub fn new(config: HttpRuntimeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke(
        &self,
        agent: &AgentDescriptor,
        history: &[Turn],
    ) -> Result<AgentOutcome, RuntimeError> {
        let conversation: Vec<Value> = history
            .iter()
            .map(|turn| {
                json!({
                    "role": match turn.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": turn.content,
                })
            })
            .collect();

        let body = json!({
            "agent": agent.name,
            "model": self.config.model,
            "instructions": agent.instructions,
            "output_schema": agent.output_schema,
            "allowed_handoffs": agent.allowed_handoffs,
            "conversation": conversation,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: RuntimeResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::Malformed(e.to_string()))?;

        Ok(AgentOutcome {
            producing_agent: parsed.agent.unwrap_or_else(|| agent.name.clone()),
            payload: parsed.output,
        })
    }
}
