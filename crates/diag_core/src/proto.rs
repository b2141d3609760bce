//! Request/response DTOs for the service surface.
//!
//! Wire-shaped types only — all behavior lives in [`crate::service`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::SnapshotSummary;
use crate::model::{AxisAnalysis, AxisResponse, KeyQuestionAnswers};
use crate::types::{AssessmentStatus, SessionStatus};

// ── Classroom sessions ────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub subject_id: String,
    /// Defaults to today 18:00 (rolled to tomorrow if already past).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Create the room with a magic token participants must present.
    #[serde(default)]
    pub with_token: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub code: String,
    /// Plaintext magic token; returned once, only the hash is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub status: SessionStatus,
    pub subject_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Live session read-out, polled by the waiting-room view. Counters come
/// from store queries rather than denormalized session columns.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub session_id: Uuid,
    pub code: String,
    pub status: SessionStatus,
    pub subject_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub participant_count: u32,
    pub assessment_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinRequest {
    /// Join via the public room list (no visible code/token).
    #[serde(default)]
    pub session_id: Option<Uuid>,
    /// Or join by typed code; matched case-insensitively.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_label: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Enough identity for the caller to proceed straight to the form.
#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub session_id: Uuid,
    pub code: String,
    pub participant_id: Uuid,
    pub status: SessionStatus,
    pub subject_id: String,
}

// ── Assessment save / submit ──────────────────────────────────

/// Respondent save. Consultant-owned fields in `axes` are ignored by this
/// path; the stored consultant scores are always preserved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub assessment_id: Option<Uuid>,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub respondent_name: Option<String>,
    #[serde(default)]
    pub respondent_email: Option<String>,
    #[serde(default)]
    pub respondent_phone: Option<String>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub assessment_date: Option<DateTime<Utc>>,
    /// Optional status carry; routed through the workflow controller.
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
    #[serde(default)]
    pub axes: Vec<AxisResponse>,
    #[serde(default)]
    pub key_questions: Option<KeyQuestionAnswers>,
    /// Last version number the caller observed; staleness is advisory.
    #[serde(default)]
    pub base_version_number: Option<u32>,
    #[serde(default)]
    pub classroom_code: Option<String>,
    #[serde(default)]
    pub classroom_token: Option<String>,
    #[serde(default)]
    pub classroom_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub id: Uuid,
    pub current_version_number: u32,
    /// True when `base_version_number` was stale. The save still applied
    /// (last-write-wins); this is a warning, not an error.
    pub conflict_detected: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub classroom_code: Option<String>,
    #[serde(default)]
    pub classroom_token: Option<String>,
    #[serde(default)]
    pub classroom_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub id: Uuid,
    pub status: AssessmentStatus,
    pub versions: Vec<SnapshotSummary>,
}

// ── Consultant save ───────────────────────────────────────────

/// Consultant scores for one axis, one per block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsultantScores {
    pub axis_key: String,
    #[serde(default)]
    pub positive: Option<u8>,
    #[serde(default)]
    pub negative: Option<u8>,
    #[serde(default)]
    pub solution: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsultantSaveRequest {
    /// When present the analyses replace the stored set wholesale.
    #[serde(default)]
    pub analyses: Option<Vec<AxisAnalysis>>,
    #[serde(default)]
    pub scores: Vec<ConsultantScores>,
    #[serde(default)]
    pub key_question_commentary: Option<String>,
    /// Target status; defaults to moving a submitted assessment to review.
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsultantSaveOutcome {
    pub id: Uuid,
    pub status: AssessmentStatus,
    pub current_version_number: u32,
}

// ── Milestones / versions ─────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MilestoneRequest {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MilestoneOutcome {
    pub id: Uuid,
    pub version_number: u32,
    pub label: String,
}
