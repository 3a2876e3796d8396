use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::Phase;
use crate::capture::ArtifactSummary;

/// Read-only view of a session for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Controller id (log correlation)
    pub session_id: Uuid,

    pub phase: Phase,

    pub prompt_id: Option<String>,

    pub question_id: Option<String>,

    /// Evaluation slot created at `begin`
    pub slot_id: Option<String>,

    /// Time budget of the current attempt in seconds
    pub response_time_limit_secs: u32,

    pub remaining_secs: u32,

    pub elapsed_secs: u32,

    /// When capture started
    pub capture_started_at: Option<DateTime<Utc>>,

    pub artifact: Option<ArtifactSummary>,

    /// Set once the submission is confirmed
    pub evaluation_id: Option<String>,

    /// Message of the most recent failed operation
    pub last_error: Option<String>,

    /// A begin or submit request is outstanding
    pub in_flight: bool,
}
