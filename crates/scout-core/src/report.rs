//! Report assembly: completion event, reflection pass, persistence.
//!
//! Takes the orchestrator's terminal output and finishes the session: emits
//! the completion progress event, runs a best-effort reflection pass over the
//! transcript, and writes the transcript and report to timestamp-named files.
//! Reflection and persistence failures are reported as progress messages and
//! logged — they never fail a session that produced a report.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agents::outputs::{ReflectionSummary, ReportData};
use crate::agents::{AgentRegistry, REFLECTION};
use crate::notify::ProgressSink;
use crate::orchestrator::RunOutcome;
use crate::runtime::AgentRuntime;
use crate::session::{Session, Turn};

pub struct ReportAssembler {
    runtime: Arc<dyn AgentRuntime>,
    registry: Arc<AgentRegistry>,
    output_dir: PathBuf,
}

impl ReportAssembler {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        registry: Arc<AgentRegistry>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            runtime,
            registry,
            output_dir,
        }
    }

    /// Finish a completed session. Returns the report unchanged; everything
    /// here is side effects around it.
    pub async fn finalize(&self, outcome: &RunOutcome, sink: &ProgressSink) -> ReportData {
        let report = &outcome.report;

        sink.emit(
            "final_report",
            format!("Report summary\n\n{}", report.short_summary),
            true,
        );
        for (i, question) in report.follow_up_questions.iter().enumerate() {
            sink.emit(
                format!("follow_up_{}", i + 1),
                format!("Follow-up question: {}", question),
                true,
            );
        }

        match self.reflect(&outcome.session).await {
            Ok(Some(summary)) => {
                tracing::info!(
                    session_id = %outcome.session.session_id,
                    research_style = %summary.research_style,
                    "reflection pass complete"
                );
                sink.emit("reflection", "Reflection pass complete", true);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    session_id = %outcome.session.session_id,
                    "reflection pass failed: {e}"
                );
                sink.emit("reflection", format!("Reflection pass failed: {e}"), true);
            }
        }

        if let Err(e) = self.persist(&outcome.session, report).await {
            tracing::warn!(
                session_id = %outcome.session.session_id,
                "failed to persist session artifacts: {e}"
            );
        }

        sink.complete(report.clone());
        report.clone()
    }

    /// Best-effort reflection over the session transcript. Returns `Ok(None)`
    /// when no reflection agent is registered.
    async fn reflect(&self, session: &Session) -> anyhow::Result<Option<ReflectionSummary>> {
        let Ok(agent) = self.registry.resolve(REFLECTION) else {
            return Ok(None);
        };

        let input = format!(
            "Research session transcript:\n\n{}\n\nAnalyze the user's research patterns.",
            session.transcript()
        );
        let outcome = self.runtime.invoke(agent, &[Turn::user(input)]).await?;
        let summary: ReflectionSummary = serde_json::from_value(outcome.payload)?;
        Ok(Some(summary))
    }

    /// Write the transcript and the markdown report, named by timestamp.
    async fn persist(&self, session: &Session, report: &ReportData) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let stamp = session.started_at.format("%Y%m%d-%H%M%S");

        let report_path = self.output_dir.join(format!("{stamp}-report.md"));
        let mut body = format!("# {}\n\n{}\n", session.query, report.markdown_report);
        if !report.follow_up_questions.is_empty() {
            body.push_str("\n## Follow-up questions\n\n");
            for question in &report.follow_up_questions {
                body.push_str(&format!("- {}\n", question));
            }
        }
        tokio::fs::write(&report_path, body).await?;

        let transcript_path = self.output_dir.join(format!("{stamp}-transcript.md"));
        tokio::fs::write(&transcript_path, session.transcript()).await?;

        tracing::info!(
            report = %report_path.display(),
            transcript = %transcript_path.display(),
            "session artifacts written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{builtin_registry, AgentDescriptor};
    use crate::notify::ChannelRegistry;
    use crate::runtime::{AgentOutcome, RuntimeError};
    use crate::session::SessionStatus;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedRuntime(Result<serde_json::Value, String>);

    #[async_trait]
    impl AgentRuntime for FixedRuntime {
        async fn invoke(
            &self,
            agent: &AgentDescriptor,
            _history: &[Turn],
        ) -> Result<AgentOutcome, RuntimeError> {
            match &self.0 {
                Ok(payload) => Ok(AgentOutcome {
                    producing_agent: agent.name.clone(),
                    payload: payload.clone(),
                }),
                Err(msg) => Err(RuntimeError::Malformed(msg.clone())),
            }
        }
    }

    fn outcome() -> RunOutcome {
        let mut session = Session::new("s1", "the query");
        session.push_assistant("findings");
        session.status = SessionStatus::Done;
        RunOutcome {
            session,
            report: ReportData {
                short_summary: "brief".to_string(),
                markdown_report: "# Full report".to_string(),
                follow_up_questions: vec!["What next?".to_string()],
            },
        }
    }

    #[tokio::test]
    async fn finalize_writes_artifacts_and_buffers_completion() {
        let dir = tempfile::tempdir().unwrap();
        let channels = Arc::new(ChannelRegistry::new());
        let sink = ProgressSink::spawn("s1", channels.clone(), None);
        let runtime = Arc::new(FixedRuntime(Ok(json!({
            "research_style": "thorough",
            "recommendations": []
        }))));

        let assembler = ReportAssembler::new(
            runtime,
            Arc::new(builtin_registry()),
            dir.path().to_path_buf(),
        );
        assembler.finalize(&outcome(), &sink).await;
        sink.close().await;

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert!(entries.iter().any(|n| n.ends_with("-report.md")));
        assert!(entries.iter().any(|n| n.ends_with("-transcript.md")));

        assert!(channels.take_result("s1").await.is_some());

        let lines = sink.lines();
        assert!(lines.iter().any(|l| l.key == "final_report" && l.done));
        assert!(lines
            .iter()
            .any(|l| l.key == "reflection" && l.message == "Reflection pass complete"));
        assert!(lines.iter().any(|l| l.key == "follow_up_1"));
    }

    #[tokio::test]
    async fn reflection_failure_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let channels = Arc::new(ChannelRegistry::new());
        let sink = ProgressSink::spawn("s1", channels.clone(), None);
        let runtime = Arc::new(FixedRuntime(Err("reflection model offline".to_string())));

        let assembler = ReportAssembler::new(
            runtime,
            Arc::new(builtin_registry()),
            dir.path().to_path_buf(),
        );
        let report = assembler.finalize(&outcome(), &sink).await;
        sink.close().await;

        // Session still completes with its report.
        assert_eq!(report.short_summary, "brief");
        assert!(channels.take_result("s1").await.is_some());

        let reflection = sink
            .lines()
            .into_iter()
            .find(|l| l.key == "reflection")
            .unwrap();
        assert!(reflection.message.contains("reflection model offline"));
    }
}
