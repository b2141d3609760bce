//! Domain aggregates and value types.
//!
//! The `Assessment` is the only shared mutable record in the system; a
//! `VersionSnapshot` is an immutable, deep-copied freeze of its state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AssessmentStatus, Role, SessionStatus};

/// One of the three fixed blocks inside an axis response.
///
/// Respondent-entered fields live in `checklist` / `narrative` / `score`;
/// `consultant_score` is stored independently and never touched by the
/// respondent save path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockResponse {
    #[serde(default)]
    pub checklist: Vec<String>,
    #[serde(default)]
    pub narrative: Option<String>,
    /// Respondent score, 0–10.
    #[serde(default)]
    pub score: Option<u8>,
    /// Consultant score, 0–10. Takes precedence in all aggregation.
    #[serde(default)]
    pub consultant_score: Option<u8>,
}

/// Per-axis respondent response: positive findings, negative findings,
/// proposed solution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisResponse {
    pub axis_key: String,
    #[serde(default)]
    pub positive: BlockResponse,
    #[serde(default)]
    pub negative: BlockResponse,
    #[serde(default)]
    pub solution: BlockResponse,
}

impl AxisResponse {
    pub fn block(&self, key: &str) -> Option<&BlockResponse> {
        match key {
            "positive" => Some(&self.positive),
            "negative" => Some(&self.negative),
            "solution" => Some(&self.solution),
            _ => None,
        }
    }
}

/// Per-axis consultant commentary, one free-text note per block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisAnalysis {
    pub axis_key: String,
    #[serde(default)]
    pub positive_note: Option<String>,
    #[serde(default)]
    pub negative_note: Option<String>,
    #[serde(default)]
    pub solution_note: Option<String>,
}

/// Key-question answers. The answer set itself is schema-light JSON (the
/// question catalogue evolves with the programme); the consultant commentary
/// is the only consultant-owned field in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyQuestionAnswers {
    #[serde(default)]
    pub answers: serde_json::Value,
    #[serde(default)]
    pub consultant_commentary: Option<String>,
}

/// The canonical mutable assessment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    /// Municipality (subject) identifier, e.g. an IBGE code.
    pub subject_id: String,
    pub respondent_name: Option<String>,
    pub respondent_email: Option<String>,
    pub respondent_phone: Option<String>,
    pub consent: bool,
    pub assessment_date: DateTime<Utc>,
    pub status: AssessmentStatus,
    /// Set when the assessment was created/edited through a classroom session.
    pub classroom_session_id: Option<Uuid>,
    pub consultant_id: Option<String>,
    pub axes: Vec<AxisResponse>,
    pub analyses: Vec<AxisAnalysis>,
    pub key_questions: Option<KeyQuestionAnswers>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Assessment {
    pub fn new(subject_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject_id,
            respondent_name: None,
            respondent_email: None,
            respondent_phone: None,
            consent: false,
            assessment_date: now,
            status: AssessmentStatus::Draft,
            classroom_session_id: None,
            consultant_id: None,
            axes: Vec::new(),
            analyses: Vec::new(),
            key_questions: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            finalized_at: None,
        }
    }

    pub fn axis(&self, key: &str) -> Option<&AxisResponse> {
        self.axes.iter().find(|a| a.axis_key == key)
    }

    pub fn analysis(&self, key: &str) -> Option<&AxisAnalysis> {
        self.analyses.iter().find(|a| a.axis_key == key)
    }
}

/// Frozen assessment state. Built once at snapshot time by deep-copying the
/// live record; afterwards it shares nothing with the mutable `Assessment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub subject_id: String,
    pub respondent_name: Option<String>,
    pub respondent_email: Option<String>,
    pub respondent_phone: Option<String>,
    pub consent: bool,
    pub status: AssessmentStatus,
    pub assessment_date: DateTime<Utc>,
    pub classroom_session_id: Option<Uuid>,
    pub axes: Vec<AxisResponse>,
    pub analyses: Vec<AxisAnalysis>,
    pub key_questions: Option<KeyQuestionAnswers>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SnapshotPayload {
    /// Deep-copy the full current state of an assessment.
    pub fn capture(assessment: &Assessment) -> Self {
        Self {
            subject_id: assessment.subject_id.clone(),
            respondent_name: assessment.respondent_name.clone(),
            respondent_email: assessment.respondent_email.clone(),
            respondent_phone: assessment.respondent_phone.clone(),
            consent: assessment.consent,
            status: assessment.status,
            assessment_date: assessment.assessment_date,
            classroom_session_id: assessment.classroom_session_id,
            axes: assessment.axes.clone(),
            analyses: assessment.analyses.clone(),
            key_questions: assessment.key_questions.clone(),
            submitted_at: assessment.submitted_at,
        }
    }
}

/// Immutable, sequentially numbered freeze of an assessment.
///
/// Version numbers are 1-based, strictly increasing and gapless per
/// assessment. The display label follows the milestone convention:
/// version 1 is "T0", version 2 is "T1", and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub version_number: u32,
    pub created_by_role: Role,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub payload: SnapshotPayload,
}

/// A time-boxed anonymous access scope bound to one municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassroomSession {
    pub id: Uuid,
    /// Human-readable join code, stored uppercase, unique.
    pub code: String,
    /// SHA-256 hex of the magic token; the plaintext is returned once at
    /// creation and never stored.
    pub token_hash: Option<String>,
    pub status: SessionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub subject_id: String,
    pub consultant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An anonymous participant resolved through the join protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassroomParticipant {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    /// Normalized (lowercased) when present; the idempotency key for re-joins.
    pub email: Option<String>,
    pub role_label: Option<String>,
    pub organization: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Network/request context attached to audit rows for forensics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

impl ActorContext {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Append-only audit record. Never updated or deleted by normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub actor: ActorContext,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        actor: &ActorContext,
        data: serde_json::Value,
    ) -> Self {
        Self {
            entity: entity.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            actor: actor.clone(),
            data,
            created_at: Utc::now(),
        }
    }
}
