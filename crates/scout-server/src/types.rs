//! Request, response, and wire-frame types for the API

use scout_core::agents::outputs::ReportData;
use scout_core::notify::SessionEvent;
use serde::{Deserialize, Serialize};

// ============================================================================
// Research Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    /// The natural-language research query.
    pub text: String,
    /// Opaque session token supplied by the client.
    pub session_id: String,
}

#[derive(Serialize)]
pub struct StartedResponse {
    pub status: &'static str,
    pub session_id: String,
    pub job_id: String,
}

// ============================================================================
// WebSocket Frames
// ============================================================================

/// Outbound frames on the session event channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Named progress update; re-sent `item` keys replace prior entries.
    Progress {
        item: String,
        message: String,
        is_done: bool,
    },
    /// Terminal report for the session.
    Complete { result: ReportData },
    /// A question the connected user should answer.
    ClarificationRequest { message: String },
}

impl From<SessionEvent> for WireEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Progress {
                item,
                message,
                is_done,
            } => Self::Progress {
                item,
                message,
                is_done,
            },
            SessionEvent::Complete { result } => Self::Complete { result },
            SessionEvent::ClarificationRequest { message } => {
                Self::ClarificationRequest { message }
            }
        }
    }
}

/// Inbound frames from a connected client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Answer to a pending clarification request.
    ClarificationResponse { text: String },
}
