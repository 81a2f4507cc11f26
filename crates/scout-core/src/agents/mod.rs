//! Agent registry: named descriptors with a validated handoff graph.
//!
//! Descriptors are static configuration. The registry is built once at
//! startup, validated, and then shared read-only behind an `Arc` — no
//! registration happens while the orchestrator runs.

pub mod outputs;

use std::collections::HashMap;

use serde_json::{json, Value};
use thiserror::Error;

/// Agent names used by the built-in registry.
pub const ORCHESTRATOR: &str = "orchestrator";
pub const PLANNER: &str = "planner";
pub const SEARCH: &str = "search";
pub const WRITER: &str = "writer";
pub const DOCUMENT: &str = "document";
pub const CODE: &str = "code";
pub const LINK: &str = "link";
pub const REFLECTION: &str = "reflection";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent '{0}' is already registered")]
    DuplicateName(String),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("agent '{agent}' declares handoffs to unregistered agents: {targets:?}")]
    DanglingHandoff { agent: String, targets: Vec<String> },
}

/// Static description of one specialized agent.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Unique name within the registry.
    pub name: String,
    /// Prompt text handed to the runtime on every invocation.
    pub instructions: String,
    /// JSON schema of the structured output this agent produces.
    pub output_schema: Value,
    /// Names of agents this one may hand control to.
    pub allowed_handoffs: Vec<String>,
}

/// Name-keyed set of agent descriptors.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentDescriptor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Fails if the name is already taken.
    pub fn register(&mut self, descriptor: AgentDescriptor) -> Result<(), RegistryError> {
        if self.agents.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        self.agents.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Look up a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<&AgentDescriptor, RegistryError> {
        self.agents
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Verify that every declared handoff target resolves to a registered
    /// agent. Run once at startup; a failure here is fatal configuration.
    pub fn validate_handoff_graph(&self) -> Result<(), RegistryError> {
        for descriptor in self.agents.values() {
            let dangling: Vec<String> = descriptor
                .allowed_handoffs
                .iter()
                .filter(|target| !self.agents.contains_key(*target))
                .cloned()
                .collect();
            if !dangling.is_empty() {
                return Err(RegistryError::DanglingHandoff {
                    agent: descriptor.name.clone(),
                    targets: dangling,
                });
            }
        }
        Ok(())
    }

    /// Whether `from` is allowed to hand control to `to`.
    pub fn handoff_allowed(&self, from: &str, to: &str) -> bool {
        self.agents
            .get(from)
            .map(|d| d.allowed_handoffs.iter().any(|h| h == to))
            .unwrap_or(false)
    }
}

/// The built-in research agents, wired in a star topology: the orchestrator
/// may delegate to any specialist, specialists hand back to the orchestrator.
/// The reflection agent runs as a side pass and is not a handoff target.
pub fn builtin_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    let back = vec![ORCHESTRATOR.to_string()];

    let descriptors = vec![
        AgentDescriptor {
            name: ORCHESTRATOR.to_string(),
            instructions: "You are a research assistant orchestrator. Analyze the user's \
                research query, decide which specialist is best suited, and hand off to it: \
                the planner for broad topics that need a search plan, the search agent for \
                direct web lookups, the document agent for summarizing supplied text, the \
                code agent for programming questions, the link agent for analyzing sources, \
                and the writer once findings are ready to be synthesized. If the query is \
                unclear or lacks detail, ask clarifying questions before delegating."
                .to_string(),
            output_schema: json!({ "type": "object" }),
            allowed_handoffs: vec![
                PLANNER.to_string(),
                SEARCH.to_string(),
                WRITER.to_string(),
                DOCUMENT.to_string(),
                CODE.to_string(),
                LINK.to_string(),
            ],
        },
        AgentDescriptor {
            name: PLANNER.to_string(),
            instructions: "You are a research planning specialist. Given a query, produce a \
                set of web searches that together cover the topic from multiple angles. For \
                each search give the term and the reason it matters. If the query is vague, \
                ask clarifying questions about timeframe, region, or the aspects of interest \
                before planning."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "searches": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "query": { "type": "string" },
                                "reason": { "type": "string" }
                            },
                            "required": ["query", "reason"]
                        }
                    }
                },
                "required": ["searches"]
            }),
            allowed_handoffs: back.clone(),
        },
        AgentDescriptor {
            name: SEARCH.to_string(),
            instructions: "You are a research assistant. Given a search term, search the web \
                and produce a concise but thorough summary of the results, capturing the main \
                points and key findings from reliable sources with citations. The summary will \
                be consumed by a report writer. Ask clarifying questions if the term is too \
                ambiguous to search usefully."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "sources": { "type": "array", "items": { "type": "string" } },
                    "key_findings": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["summary"]
            }),
            allowed_handoffs: back.clone(),
        },
        AgentDescriptor {
            name: WRITER.to_string(),
            instructions: "You are a senior researcher writing a cohesive report. You receive \
                the original query and summarized findings from various sources. Produce a \
                detailed markdown report with proper citations, a short two-to-three sentence \
                summary, and follow-up questions worth researching next. If the findings are \
                incomplete, ask for the missing pieces instead of guessing."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "short_summary": { "type": "string" },
                    "markdown_report": { "type": "string" },
                    "follow_up_questions": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["short_summary", "markdown_report"]
            }),
            allowed_handoffs: back.clone(),
        },
        AgentDescriptor {
            name: DOCUMENT.to_string(),
            instructions: "You are a document processing specialist. Read the supplied text, \
                extract the main points, summarize it comprehensively, and score its relevance \
                to the research query between 0 and 1. Ask clarifying questions when the \
                research context is missing."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "summary": { "type": "string" },
                    "key_points": { "type": "array", "items": { "type": "string" } },
                    "relevance_score": { "type": "number" }
                },
                "required": ["title", "summary"]
            }),
            allowed_handoffs: back.clone(),
        },
        AgentDescriptor {
            name: CODE.to_string(),
            instructions: "You are a code search specialist. For programming questions, find \
                relevant examples, provide working snippets with explanations and sources, and \
                note best practices and common pitfalls. Ask about language, framework version, \
                or use case when the request lacks technical specificity."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "snippets": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "language": { "type": "string" },
                                "code": { "type": "string" },
                                "explanation": { "type": "string" },
                                "source": { "type": "string" }
                            },
                            "required": ["language", "code"]
                        }
                    },
                    "summary": { "type": "string" },
                    "best_practices": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["summary"]
            }),
            allowed_handoffs: back.clone(),
        },
        AgentDescriptor {
            name: LINK.to_string(),
            instructions: "You are a source analysis specialist. For each link encountered \
                during research, classify the content (academic, news, blog, reference), and \
                score its relevance and credibility between 0 and 1. Recommend similar \
                high-quality sources."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "analyzed_links": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "url": { "type": "string" },
                                "domain": { "type": "string" },
                                "category": { "type": "string" },
                                "relevance": { "type": "number" },
                                "credibility": { "type": "number" }
                            },
                            "required": ["url"]
                        }
                    },
                    "source_preferences": { "type": "array", "items": { "type": "string" } },
                    "recommendations": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["analyzed_links"]
            }),
            allowed_handoffs: back,
        },
        AgentDescriptor {
            name: REFLECTION.to_string(),
            instructions: "You are a reflection specialist. After a research session, analyze \
                the transcript, infer the user's interests and research style from observed \
                behavior only, and recommend future research directions. Be insightful but not \
                presumptuous."
                .to_string(),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "user_preferences": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "topic": { "type": "string" },
                                "interest_level": { "type": "number" },
                                "relevance": { "type": "string" }
                            },
                            "required": ["topic"]
                        }
                    },
                    "research_style": { "type": "string" },
                    "recommendations": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["research_style"]
            }),
            allowed_handoffs: Vec::new(),
        },
    ];

    for descriptor in descriptors {
        registry
            .register(descriptor)
            .expect("built-in agent names are unique");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, handoffs: &[&str]) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            instructions: "test".to_string(),
            output_schema: json!({ "type": "object" }),
            allowed_handoffs: handoffs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn register_rejects_duplicate_name() {
        let mut registry = AgentRegistry::new();
        registry.register(descriptor("a", &[])).unwrap();
        let err = registry.register(descriptor("a", &[])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn resolve_unknown_agent_fails() {
        let registry = AgentRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAgent(name) if name == "missing"));
    }

    #[test]
    fn validate_reports_dangling_handoffs() {
        let mut registry = AgentRegistry::new();
        registry.register(descriptor("a", &["b", "ghost"])).unwrap();
        registry.register(descriptor("b", &["a"])).unwrap();
        let err = registry.validate_handoff_graph().unwrap_err();
        match err {
            RegistryError::DanglingHandoff { agent, targets } => {
                assert_eq!(agent, "a");
                assert_eq!(targets, vec!["ghost".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builtin_registry_graph_is_closed() {
        let registry = builtin_registry();
        registry.validate_handoff_graph().unwrap();
        assert!(registry.handoff_allowed(ORCHESTRATOR, PLANNER));
        assert!(registry.handoff_allowed(PLANNER, ORCHESTRATOR));
        assert!(!registry.handoff_allowed(ORCHESTRATOR, REFLECTION));
    }
}
