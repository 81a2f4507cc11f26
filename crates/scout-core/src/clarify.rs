//! Clarification broker: human-in-the-loop question/answer round-trips.
//!
//! The orchestrator calls `request` and suspends until an answer arrives from
//! the external channel or the timeout elapses. One outstanding request per
//! session at a time; the wait handle is released on every path. A request
//! with no listener attached must not hang — it resolves immediately with an
//! explanatory sentinel answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, RwLock};

use crate::notify::{ChannelRegistry, ProgressSink};

/// How long to wait for a human answer before giving up.
pub const DEFAULT_CLARIFICATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Answer returned when the timeout elapses. Recoverable, not fatal.
pub const TIMEOUT_ANSWER: &str = "User did not respond within the time limit";

/// Answer returned when no client is attached to the session.
pub const NO_LISTENER_ANSWER: &str =
    "No client is connected to this session; proceeding without clarification";

/// Fallback when the wait handle is released without an answer (session teardown).
const NO_ANSWER_FALLBACK: &str = "No response provided";

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("a clarification request is already pending for session '{0}'")]
    DuplicateRequest(String),
}

/// Per-session synchronization point between the orchestrator loop and the
/// inbound answer channel.
pub struct ClarificationBroker {
    channels: Arc<ChannelRegistry>,
    waiting: RwLock<HashMap<String, oneshot::Sender<String>>>,
    answers: RwLock<HashMap<String, String>>,
    timeout: Duration,
}

impl ClarificationBroker {
    pub fn new(channels: Arc<ChannelRegistry>, timeout: Duration) -> Self {
        Self {
            channels,
            waiting: RwLock::new(HashMap::new()),
            answers: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Ask the human the given questions and block until an answer arrives or
    /// the timeout elapses. Timeout and missing-listener cases resolve with a
    /// sentinel answer rather than an error.
    pub async fn request(
        &self,
        session_id: &str,
        sink: &ProgressSink,
        questions: &[String],
    ) -> Result<String, BrokerError> {
        if !self.channels.has_listeners(session_id).await {
            tracing::warn!(session_id, "clarification requested with no listener attached");
            return Ok(NO_LISTENER_ANSWER.to_string());
        }

        // An answer recorded while nothing was pending is picked up by the
        // next request that starts.
        if let Some(prior) = self.answers.write().await.remove(session_id) {
            tracing::debug!(session_id, "using previously recorded clarification answer");
            return Ok(prior);
        }

        let (answer_tx, answer_rx) = oneshot::channel();
        {
            let mut waiting = self.waiting.write().await;
            if waiting.contains_key(session_id) {
                return Err(BrokerError::DuplicateRequest(session_id.to_string()));
            }
            waiting.insert(session_id.to_string(), answer_tx);
        }

        // An answer submitted between the consume above and the handle
        // registration lands in `answers`; pick it up now instead of waiting
        // out the timeout.
        if let Some(raced) = self.answers.write().await.remove(session_id) {
            self.waiting.write().await.remove(session_id);
            return Ok(raced);
        }

        sink.clarification(questions.join("\n"));

        let answer = match tokio::time::timeout(self.timeout, answer_rx).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => {
                // Handle dropped without an answer (session teardown).
                tracing::warn!(session_id, "clarification wait handle released without answer");
                NO_ANSWER_FALLBACK.to_string()
            }
            Err(_) => {
                tracing::warn!(session_id, "clarification timed out");
                TIMEOUT_ANSWER.to_string()
            }
        };

        // Guaranteed release, whichever path resolved the wait.
        self.waiting.write().await.remove(session_id);
        Ok(answer)
    }

    /// Deliver an answer from the external channel. With a request pending it
    /// resolves the wait; otherwise the text is recorded with a warning and
    /// only used if a new request starts afterwards.
    pub async fn submit_answer(&self, session_id: &str, text: String) {
        if let Some(sender) = self.waiting.write().await.remove(session_id) {
            if sender.send(text).is_err() {
                tracing::warn!(session_id, "clarification answer arrived after the wait ended");
            }
            return;
        }
        tracing::warn!(session_id, "no pending clarification; recording answer");
        self.answers.write().await.insert(session_id.to_string(), text);
    }

    /// Session teardown: drop any pending wait handle and recorded answer.
    pub async fn clear_session(&self, session_id: &str) {
        self.waiting.write().await.remove(session_id);
        self.answers.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ProgressSink;
    use std::time::Instant;

    fn fixture(timeout: Duration) -> (Arc<ClarificationBroker>, ProgressSink, Arc<ChannelRegistry>) {
        let channels = Arc::new(ChannelRegistry::new());
        let sink = ProgressSink::spawn("s1", channels.clone(), None);
        let broker = Arc::new(ClarificationBroker::new(channels.clone(), timeout));
        (broker, sink, channels)
    }

    #[tokio::test]
    async fn no_listener_resolves_immediately() {
        let (broker, sink, _channels) = fixture(Duration::from_secs(5));
        let answer = broker
            .request("s1", &sink, &["Which timeframe?".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, NO_LISTENER_ANSWER);
    }

    #[tokio::test]
    async fn submitted_answer_is_returned_exactly() {
        let (broker, sink, channels) = fixture(Duration::from_secs(5));
        let mut rx = channels.attach("s1").await;

        let request = {
            let broker = broker.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                broker
                    .request("s1", &sink, &["Which timeframe?".to_string()])
                    .await
            })
        };

        // The question must reach the listener before the answer resolves it.
        loop {
            match rx.recv().await.unwrap() {
                crate::notify::SessionEvent::ClarificationRequest { message } => {
                    assert_eq!(message, "Which timeframe?");
                    break;
                }
                _ => continue,
            }
        }

        broker.submit_answer("s1", "last 5 years".to_string()).await;
        let answer = request.await.unwrap().unwrap();
        assert_eq!(answer, "last 5 years");
    }

    #[tokio::test]
    async fn timeout_returns_sentinel_not_before_deadline() {
        let (broker, sink, channels) = fixture(Duration::from_millis(100));
        let _rx = channels.attach("s1").await;

        let start = Instant::now();
        let answer = broker
            .request("s1", &sink, &["Anything?".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, TIMEOUT_ANSWER);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn second_concurrent_request_is_rejected() {
        let (broker, sink, channels) = fixture(Duration::from_millis(500));
        let _rx = channels.attach("s1").await;

        let first = {
            let broker = broker.clone();
            let sink = sink.clone();
            tokio::spawn(async move { broker.request("s1", &sink, &["One?".to_string()]).await })
        };
        // Let the first request register its wait handle.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = broker
            .request("s1", &sink, &["Two?".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::DuplicateRequest(id) if id == "s1"));

        broker.submit_answer("s1", "answer".to_string()).await;
        assert_eq!(first.await.unwrap().unwrap(), "answer");
    }

    #[tokio::test]
    async fn unsolicited_answer_feeds_the_next_request() {
        let (broker, sink, channels) = fixture(Duration::from_secs(5));
        let _rx = channels.attach("s1").await;

        // Nothing pending: recorded, not an error.
        broker.submit_answer("s1", "early answer".to_string()).await;

        let answer = broker
            .request("s1", &sink, &["Question?".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, "early answer");

        // Consumed: a following request waits normally.
        let (broker2, sink2, channels2) = fixture(Duration::from_millis(50));
        let _rx2 = channels2.attach("s1").await;
        let answer = broker2
            .request("s1", &sink2, &["Question?".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, TIMEOUT_ANSWER);
    }

    #[tokio::test]
    async fn answer_racing_the_request_is_never_lost() {
        // Whichever side of the handle registration the answer lands on
        // (consumed up front, picked up after registering, or delivered
        // through the handle), the request must resolve with it.
        for _ in 0..50 {
            let (broker, sink, channels) = fixture(Duration::from_millis(500));
            let _rx = channels.attach("s1").await;

            let submit = {
                let broker = broker.clone();
                tokio::spawn(async move {
                    broker.submit_answer("s1", "raced".to_string()).await;
                })
            };
            let answer = broker
                .request("s1", &sink, &["Question?".to_string()])
                .await
                .unwrap();
            submit.await.unwrap();

            assert_eq!(answer, "raced");
        }
    }

    #[tokio::test]
    async fn wait_handle_is_released_after_timeout() {
        let (broker, sink, channels) = fixture(Duration::from_millis(50));
        let _rx = channels.attach("s1").await;

        let _ = broker.request("s1", &sink, &["One?".to_string()]).await;

        // No stale handle: a fresh request registers and waits again.
        let answer = broker
            .request("s1", &sink, &["Two?".to_string()])
            .await
            .unwrap();
        assert_eq!(answer, TIMEOUT_ANSWER);
    }
}
