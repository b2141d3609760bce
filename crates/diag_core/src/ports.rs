//! Storage port traits.
//!
//! Implemented by `diag_postgres` for production and by [`crate::memory`]
//! for tests and DB-less runs. Core logic depends only on these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DiagError;
use crate::model::{
    Assessment, AuditLogEntry, ClassroomParticipant, ClassroomSession, SnapshotPayload,
    VersionSnapshot,
};
use crate::types::{Role, SessionStatus};

pub type Result<T> = std::result::Result<T, DiagError>;

/// Owns the canonical mutable assessment aggregate.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn insert(&self, assessment: Assessment) -> Result<Assessment>;

    /// Persist the aggregate as-is (axes and analyses replaced wholesale).
    async fn update(&self, assessment: Assessment) -> Result<Assessment>;

    async fn get(&self, id: Uuid) -> Result<Assessment>;

    /// The assessment linked to a classroom session, if any. A classroom
    /// session carries at most one assessment lineage.
    async fn find_by_session(&self, session_id: Uuid) -> Result<Option<Assessment>>;

    /// Number of assessments opened through a classroom session.
    async fn count_by_session(&self, session_id: Uuid) -> Result<u32>;
}

/// Owns immutable version snapshots. Read-only to everyone else.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Freeze `payload` as the next sequential version of `assessment_id`.
    ///
    /// Number assignment must serialize per assessment: no duplicates, no
    /// gaps, even under concurrent callers. When `label` is None the
    /// milestone convention (`T{n-1}`) applies.
    async fn create(
        &self,
        assessment_id: Uuid,
        created_by_role: Role,
        label: Option<String>,
        payload: SnapshotPayload,
    ) -> Result<VersionSnapshot>;

    /// All snapshots of an assessment, ascending by version number.
    async fn list(&self, assessment_id: Uuid) -> Result<Vec<VersionSnapshot>>;

    async fn get(&self, snapshot_id: Uuid) -> Result<VersionSnapshot>;

    /// Number of snapshots, which is the authoritative version counter.
    async fn count(&self, assessment_id: Uuid) -> Result<u32>;
}

/// Owns classroom sessions and their participants.
#[async_trait]
pub trait ClassroomStore: Send + Sync {
    /// Insert a new session. Fails if the code is already taken (callers
    /// regenerate and retry).
    async fn insert_session(&self, session: ClassroomSession) -> Result<ClassroomSession>;

    async fn get_session(&self, id: Uuid) -> Result<ClassroomSession>;

    /// Lookup by normalized (uppercase) code.
    async fn find_session_by_code(&self, code: &str) -> Result<Option<ClassroomSession>>;

    async fn find_active_session_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<ClassroomSession>>;

    async fn update_session_status(&self, id: Uuid, status: SessionStatus)
        -> Result<ClassroomSession>;

    /// Idempotency lookup: participant by (session, normalized email).
    async fn find_participant_by_email(
        &self,
        session_id: Uuid,
        email: &str,
    ) -> Result<Option<ClassroomParticipant>>;

    async fn insert_participant(
        &self,
        participant: ClassroomParticipant,
    ) -> Result<ClassroomParticipant>;

    /// Number of participants who have joined the session.
    async fn count_participants(&self, session_id: Uuid) -> Result<u32>;
}

/// Append-only audit trail.
///
/// Callers must never fail the triggering operation on an append error;
/// use [`log_audit`] which downgrades failures to a warning.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<()>;
}

/// Best-effort audit append.
pub async fn log_audit(audit: &dyn AuditLog, entry: AuditLogEntry) {
    let action = entry.action.clone();
    if let Err(e) = audit.append(entry).await {
        tracing::warn!(action = %action, error = %e, "audit append failed");
    }
}
