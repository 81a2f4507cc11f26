//! Progress notification fan-out.
//!
//! `ProgressSink` is the write side: `emit` never fails to the caller and
//! never blocks the research flow. Events are queued onto a channel consumed
//! by a dedicated dispatcher task, which updates the local line display
//! (update-in-place per key) and forwards to the session's remote listeners
//! through the `ChannelRegistry`. Delivery failure is logged, never
//! propagated.
//!
//! `ChannelRegistry` holds the per-session listener channels and the buffered
//! completed results replayed to late-attaching listeners. It is constructed
//! once at process start and passed by handle to whoever needs it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

use crate::agents::outputs::ReportData;

const LISTENER_CHANNEL_CAPACITY: usize = 256;

/// Canonical event protocol between a running session and its listeners.
/// Transport layers map these to their own wire format.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Named progress update. Re-emitting an `item` replaces the prior entry.
    Progress {
        item: String,
        message: String,
        is_done: bool,
    },
    /// A question for the human user, published by the clarification broker.
    ClarificationRequest { message: String },
    /// Terminal report for the session.
    Complete { result: ReportData },
}

/// One entry of the local progress display.
#[derive(Debug, Clone)]
pub struct ProgressLine {
    pub key: String,
    pub message: String,
    pub done: bool,
}

/// Local display hook, driven from the dispatcher task after every update.
pub trait ProgressRender: Send {
    fn render(&mut self, lines: &[ProgressLine]);
}

/// Per-session listener channels plus buffered completion state.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>,
    results: RwLock<HashMap<String, ReportData>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to a session, creating the channel if needed.
    pub async fn attach(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(LISTENER_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop the channel entry once its last listener has detached, so a
    /// disconnected session does not leak. Any still-buffered result is
    /// released with it: an attached listener has already received the
    /// completion, live or via replay.
    pub async fn detach(&self, session_id: &str) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(session_id) {
            if sender.receiver_count() == 0 {
                channels.remove(session_id);
                self.results.write().await.remove(session_id);
                tracing::debug!(session_id, "last listener detached; channel released");
            }
        }
    }

    pub async fn has_listeners(&self, session_id: &str) -> bool {
        self.channels
            .read()
            .await
            .get(session_id)
            .map(|sender| sender.receiver_count() > 0)
            .unwrap_or(false)
    }

    /// Deliver an event to all listeners of a session. A session with no
    /// listeners is not an error.
    pub async fn publish(&self, session_id: &str, event: SessionEvent) {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(session_id) {
            if sender.send(event).is_err() {
                tracing::trace!(session_id, "no listeners for session event");
            }
        }
    }

    /// Buffer the completed result for replay to late-attaching listeners.
    pub async fn store_result(&self, session_id: &str, result: ReportData) {
        self.results
            .write()
            .await
            .insert(session_id.to_string(), result);
    }

    /// Consume the buffered result, if any. Released once consumed.
    pub async fn take_result(&self, session_id: &str) -> Option<ReportData> {
        self.results.write().await.remove(session_id)
    }

    /// Session teardown: release the channel and any unconsumed result.
    pub async fn remove_session(&self, session_id: &str) {
        self.channels.write().await.remove(session_id);
        self.results.write().await.remove(session_id);
    }
}

enum SinkCommand {
    Emit {
        key: String,
        message: String,
        done: bool,
    },
    Clarify {
        message: String,
    },
    Complete {
        result: ReportData,
    },
    Close(oneshot::Sender<()>),
}

/// Write handle for session progress. Cheap to clone; all methods are
/// fire-and-forget for the caller.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    lines: Arc<Mutex<Vec<ProgressLine>>>,
}

impl ProgressSink {
    /// Start the dispatcher task for one session and return its sink.
    pub fn spawn(
        session_id: impl Into<String>,
        channels: Arc<ChannelRegistry>,
        renderer: Option<Box<dyn ProgressRender>>,
    ) -> Self {
        let session_id = session_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let lines = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(dispatch(session_id, channels, renderer, rx, lines.clone()));

        Self { tx, lines }
    }

    /// Emit a named progress event. Re-emitting a key updates the existing
    /// entry in place.
    pub fn emit(&self, key: impl Into<String>, message: impl Into<String>, done: bool) {
        let command = SinkCommand::Emit {
            key: key.into(),
            message: message.into(),
            done,
        };
        if self.tx.send(command).is_err() {
            tracing::warn!("progress sink closed; event dropped");
        }
    }

    /// Publish a clarification question to the session's listeners.
    pub fn clarification(&self, message: impl Into<String>) {
        let command = SinkCommand::Clarify {
            message: message.into(),
        };
        if self.tx.send(command).is_err() {
            tracing::warn!("progress sink closed; clarification request dropped");
        }
    }

    /// Publish the terminal report and buffer it for late listeners.
    pub fn complete(&self, result: ReportData) {
        if self.tx.send(SinkCommand::Complete { result }).is_err() {
            tracing::warn!("progress sink closed; completion dropped");
        }
    }

    /// Flush queued events and stop the dispatcher. Safe to call repeatedly.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SinkCommand::Close(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Snapshot of the current display lines.
    pub fn lines(&self) -> Vec<ProgressLine> {
        self.lines.lock().expect("progress lines lock").clone()
    }
}

async fn dispatch(
    session_id: String,
    channels: Arc<ChannelRegistry>,
    mut renderer: Option<Box<dyn ProgressRender>>,
    mut rx: mpsc::UnboundedReceiver<SinkCommand>,
    lines: Arc<Mutex<Vec<ProgressLine>>>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Emit { key, message, done } => {
                let snapshot = {
                    let mut lines = lines.lock().expect("progress lines lock");
                    match lines.iter_mut().find(|line| line.key == key) {
                        Some(line) => {
                            line.message = message.clone();
                            line.done = done;
                        }
                        None => lines.push(ProgressLine {
                            key: key.clone(),
                            message: message.clone(),
                            done,
                        }),
                    }
                    lines.clone()
                };
                if let Some(renderer) = renderer.as_mut() {
                    renderer.render(&snapshot);
                }
                channels
                    .publish(
                        &session_id,
                        SessionEvent::Progress {
                            item: key,
                            message,
                            is_done: done,
                        },
                    )
                    .await;
            }
            SinkCommand::Clarify { message } => {
                channels
                    .publish(&session_id, SessionEvent::ClarificationRequest { message })
                    .await;
            }
            SinkCommand::Complete { result } => {
                channels.store_result(&session_id, result.clone()).await;
                channels
                    .publish(&session_id, SessionEvent::Complete { result })
                    .await;
            }
            SinkCommand::Close(ack) => {
                let _ = ack.send(());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> (ProgressSink, Arc<ChannelRegistry>) {
        let channels = Arc::new(ChannelRegistry::new());
        let sink = ProgressSink::spawn("s1", channels.clone(), None);
        (sink, channels)
    }

    fn report() -> ReportData {
        ReportData {
            short_summary: "summary".to_string(),
            markdown_report: "# report".to_string(),
            follow_up_questions: vec![],
        }
    }

    #[tokio::test]
    async fn reemitting_a_key_updates_in_place() {
        let (sink, _channels) = sink();
        sink.emit("searching", "Searching...", false);
        sink.emit("searching", "Searching... 1/3", false);
        sink.emit("planning", "Planning...", true);
        sink.close().await;

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key, "searching");
        assert_eq!(lines[0].message, "Searching... 1/3");
        assert_eq!(lines[1].key, "planning");
        assert!(lines[1].done);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_emit_after_close_is_swallowed() {
        let (sink, _channels) = sink();
        sink.close().await;
        sink.close().await;
        // Must not panic or error.
        sink.emit("late", "too late", true);
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn events_reach_attached_listeners() {
        let (sink, channels) = sink();
        let mut rx = channels.attach("s1").await;

        sink.emit("starting", "Starting research...", true);
        sink.close().await;

        match rx.recv().await.unwrap() {
            SessionEvent::Progress {
                item,
                message,
                is_done,
            } => {
                assert_eq!(item, "starting");
                assert_eq!(message, "Starting research...");
                assert!(is_done);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn completion_is_buffered_and_consumed_once() {
        let (sink, channels) = sink();
        sink.complete(report());
        sink.close().await;

        assert!(channels.take_result("s1").await.is_some());
        assert!(channels.take_result("s1").await.is_none());
    }

    #[tokio::test]
    async fn detach_releases_channel_when_last_listener_leaves() {
        let channels = Arc::new(ChannelRegistry::new());
        let rx = channels.attach("s1").await;
        assert!(channels.has_listeners("s1").await);

        drop(rx);
        channels.detach("s1").await;
        assert!(!channels.has_listeners("s1").await);
    }

    #[tokio::test]
    async fn last_listener_detach_releases_buffered_result() {
        let channels = Arc::new(ChannelRegistry::new());
        let rx = channels.attach("s1").await;
        channels.store_result("s1", report()).await;

        drop(rx);
        channels.detach("s1").await;
        assert!(channels.take_result("s1").await.is_none());
    }

    #[tokio::test]
    async fn remove_session_drops_channel_and_result() {
        let channels = Arc::new(ChannelRegistry::new());
        let _rx = channels.attach("s1").await;
        channels.store_result("s1", report()).await;

        channels.remove_session("s1").await;
        assert!(!channels.has_listeners("s1").await);
        assert!(channels.take_result("s1").await.is_none());
    }
}
