//! Structured output payloads produced by the built-in agents.
//!
//! These mirror the `output_schema` declarations in the registry. Payloads
//! arrive from the runtime as raw JSON and are deserialized into these types
//! during classification and fan-out.

use serde::{Deserialize, Serialize};

/// One planned web search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchItem {
    /// The search term to use.
    pub query: String,
    /// Why this search matters for the query.
    pub reason: String,
}

/// A planner result: the searches to perform for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchPlan {
    pub searches: Vec<WebSearchItem>,
}

/// A search agent result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub key_findings: Vec<String>,
}

/// A document agent result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub source: String,
}

/// A code agent result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchResult {
    #[serde(default)]
    pub snippets: Vec<CodeSnippet>,
    pub summary: String,
    #[serde(default)]
    pub best_practices: Vec<String>,
}

/// The terminal report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    /// Two-to-three sentence summary of the findings.
    pub short_summary: String,
    /// The full report, markdown formatted.
    pub markdown_report: String,
    /// Suggested directions for further research. May be empty.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// An agent's request for more information from the human user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Ordered, non-empty list of questions.
    pub questions: Vec<String>,
    /// Free-text context for why the questions are being asked.
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub topic: String,
    #[serde(default)]
    pub interest_level: f64,
    #[serde(default)]
    pub relevance: String,
}

/// A reflection agent result — inferred preferences from the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionSummary {
    #[serde(default)]
    pub user_preferences: Vec<UserPreference>,
    pub research_style: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_defaults_follow_ups_to_empty() {
        let report: ReportData = serde_json::from_value(json!({
            "short_summary": "summary",
            "markdown_report": "# Report"
        }))
        .unwrap();
        assert!(report.follow_up_questions.is_empty());
    }

    #[test]
    fn clarification_context_is_optional() {
        let req: ClarificationRequest = serde_json::from_value(json!({
            "questions": ["Which timeframe?"]
        }))
        .unwrap();
        assert_eq!(req.questions.len(), 1);
        assert!(req.context.is_empty());
    }
}
