//! Scout core library
//!
//! ## Orchestrator (the canonical research loop)
//! - `ResearchOrchestrator` - drives invoke → classify → append until a report
//! - `OrchestratorConfig` / `OrchestratorServices` - configuration and dependencies
//! - `classify` / `TurnOutcome` - the four-way result classification
//!
//! ## Core Components
//! - `AgentRegistry` - named agent descriptors with a validated handoff graph
//! - `ClarificationBroker` - human-in-the-loop question/answer round-trips
//! - `ProgressSink` / `ChannelRegistry` - progress fan-out to local display and
//!   remote session listeners
//! - `ReportAssembler` - final artifact, reflection pass, transcript persistence
//!
//! Transport layers (CLI, HTTP server) are thin consumers: they attach session
//! listeners, map `SessionEvent` to their own format, and feed clarification
//! answers back through the broker.

pub mod agents;
pub mod classify;
pub mod clarify;
pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod runtime;
pub mod session;

pub use agents::{builtin_registry, AgentDescriptor, AgentRegistry, RegistryError};
pub use classify::{classify, TurnOutcome};
pub use clarify::{BrokerError, ClarificationBroker};
pub use config::ScoutConfig;
pub use notify::{ChannelRegistry, ProgressLine, ProgressSink, SessionEvent};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorServices, ResearchOrchestrator, RunOutcome,
};
pub use report::ReportAssembler;
pub use runtime::{AgentOutcome, AgentRuntime, HttpAgentRuntime, RuntimeError};
pub use session::{Role, Session, SessionStatus, Turn};
