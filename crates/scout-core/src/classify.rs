//! Four-way classification of agent invocation results.
//!
//! Every raw payload lands in exactly one `TurnOutcome` variant, checked in
//! the fixed priority order clarification → report → handoff → continuation.
//! A payload that happens to satisfy multiple shape checks is resolved by
//! this order, never ambiguously.

use serde_json::Value;

use crate::agents::outputs::{ClarificationRequest, ReportData};
use crate::agents::AgentRegistry;
use crate::runtime::AgentOutcome;

/// Classified result of one loop iteration.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The agent needs more information from the human user.
    Clarification(ClarificationRequest),
    /// Terminal report — the loop is done.
    Report(ReportData),
    /// Control passed to a different agent.
    Handoff { agent: String },
    /// Non-terminal result; the same agent keeps working.
    Continuation { payload: Value },
}

/// Classify a raw outcome. Total: every representable payload maps to
/// exactly one variant.
pub fn classify(outcome: &AgentOutcome, current_agent: &str, registry: &AgentRegistry) -> TurnOutcome {
    // 1. Clarification: a non-empty `questions` array of strings.
    if let Some(request) = as_clarification(&outcome.payload) {
        return TurnOutcome::Clarification(request);
    }

    // 2. Report: the terminal report shape.
    if let Some(report) = as_report(&outcome.payload) {
        return TurnOutcome::Report(report);
    }

    // 3. Handoff: a different agent produced the result, and the transfer is
    //    permitted by the current agent's handoff set.
    if outcome.producing_agent != current_agent {
        if registry.handoff_allowed(current_agent, &outcome.producing_agent) {
            return TurnOutcome::Handoff {
                agent: outcome.producing_agent.clone(),
            };
        }
        tracing::warn!(
            current_agent,
            producing_agent = %outcome.producing_agent,
            "result attributed to an agent outside the allowed handoff set; treating as continuation"
        );
    }

    // 4. Everything else continues with the same agent.
    TurnOutcome::Continuation {
        payload: outcome.payload.clone(),
    }
}

fn as_clarification(payload: &Value) -> Option<ClarificationRequest> {
    let questions = payload.get("questions")?.as_array()?;
    if questions.is_empty() || !questions.iter().all(Value::is_string) {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}

fn as_report(payload: &Value) -> Option<ReportData> {
    // Require both report fields to be present as strings; `from_value` alone
    // would also accept payloads with unrelated extra shapes.
    if !payload.get("short_summary").is_some_and(Value::is_string)
        || !payload.get("markdown_report").is_some_and(Value::is_string)
    {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{builtin_registry, ORCHESTRATOR, PLANNER, REFLECTION, SEARCH};
    use serde_json::json;

    fn outcome(agent: &str, payload: Value) -> AgentOutcome {
        AgentOutcome {
            producing_agent: agent.to_string(),
            payload,
        }
    }

    #[test]
    fn clarification_wins_over_report_shape() {
        let registry = builtin_registry();
        // Malformed output carrying both shapes resolves by priority order.
        let result = classify(
            &outcome(
                ORCHESTRATOR,
                json!({
                    "questions": ["Which timeframe?"],
                    "short_summary": "s",
                    "markdown_report": "r"
                }),
            ),
            ORCHESTRATOR,
            &registry,
        );
        assert!(matches!(result, TurnOutcome::Clarification(_)));
    }

    #[test]
    fn empty_questions_are_not_a_clarification() {
        let registry = builtin_registry();
        let result = classify(
            &outcome(ORCHESTRATOR, json!({ "questions": [] })),
            ORCHESTRATOR,
            &registry,
        );
        assert!(matches!(result, TurnOutcome::Continuation { .. }));
    }

    #[test]
    fn report_shape_is_terminal() {
        let registry = builtin_registry();
        let result = classify(
            &outcome(
                ORCHESTRATOR,
                json!({ "short_summary": "s", "markdown_report": "# r" }),
            ),
            ORCHESTRATOR,
            &registry,
        );
        match result {
            TurnOutcome::Report(report) => assert_eq!(report.markdown_report, "# r"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn different_producer_is_a_handoff() {
        let registry = builtin_registry();
        let result = classify(
            &outcome(PLANNER, json!({ "note": "delegating" })),
            ORCHESTRATOR,
            &registry,
        );
        assert!(matches!(result, TurnOutcome::Handoff { agent } if agent == PLANNER));
    }

    #[test]
    fn disallowed_producer_degrades_to_continuation() {
        let registry = builtin_registry();
        // reflection is not in the orchestrator's handoff set
        let result = classify(
            &outcome(REFLECTION, json!({ "note": "x" })),
            ORCHESTRATOR,
            &registry,
        );
        assert!(matches!(result, TurnOutcome::Continuation { .. }));
    }

    #[test]
    fn same_producer_non_terminal_continues() {
        let registry = builtin_registry();
        let result = classify(
            &outcome(SEARCH, json!({ "summary": "partial" })),
            SEARCH,
            &registry,
        );
        assert!(matches!(result, TurnOutcome::Continuation { .. }));
    }

    #[test]
    fn classification_is_total_over_odd_payloads() {
        let registry = builtin_registry();
        for payload in [
            json!(null),
            json!("just text"),
            json!(42),
            json!({ "questions": "not an array" }),
            json!({ "short_summary": 1, "markdown_report": "r" }),
        ] {
            let result = classify(&outcome(ORCHESTRATOR, payload), ORCHESTRATOR, &registry);
            assert!(matches!(result, TurnOutcome::Continuation { .. }));
        }
    }
}
