//! In-memory port implementations.
//!
//! Backs unit and HTTP integration tests, and DB-less demo runs. Snapshot
//! numbering and code uniqueness are enforced under the same write locks the
//! Postgres adapters enforce with transactions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::compare::milestone_label;
use crate::error::DiagError;
use crate::model::{
    Assessment, AuditLogEntry, ClassroomParticipant, ClassroomSession, SnapshotPayload,
    VersionSnapshot,
};
use crate::ports::{AssessmentStore, AuditLog, ClassroomStore, Result, SnapshotStore};
use crate::types::{Role, SessionStatus};

#[derive(Default)]
pub struct MemAssessmentStore {
    records: RwLock<HashMap<Uuid, Assessment>>,
}

impl MemAssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentStore for MemAssessmentStore {
    async fn insert(&self, assessment: Assessment) -> Result<Assessment> {
        let mut records = self.records.write().await;
        records.insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    async fn update(&self, assessment: Assessment) -> Result<Assessment> {
        let mut records = self.records.write().await;
        if !records.contains_key(&assessment.id) {
            return Err(DiagError::NotFound(format!("assessment {}", assessment.id)));
        }
        records.insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    async fn get(&self, id: Uuid) -> Result<Assessment> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DiagError::NotFound(format!("assessment {id}")))
    }

    async fn find_by_session(&self, session_id: Uuid) -> Result<Option<Assessment>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|a| a.classroom_session_id == Some(session_id))
            .cloned())
    }

    async fn count_by_session(&self, session_id: Uuid) -> Result<u32> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|a| a.classroom_session_id == Some(session_id))
            .count() as u32)
    }
}

#[derive(Default)]
pub struct MemSnapshotStore {
    snapshots: RwLock<Vec<VersionSnapshot>>,
}

impl MemSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemSnapshotStore {
    async fn create(
        &self,
        assessment_id: Uuid,
        created_by_role: Role,
        label: Option<String>,
        payload: SnapshotPayload,
    ) -> Result<VersionSnapshot> {
        // Numbering happens under the write lock so it is gap-free.
        let mut snapshots = self.snapshots.write().await;
        let version_number = snapshots
            .iter()
            .filter(|s| s.assessment_id == assessment_id)
            .count() as u32
            + 1;
        let snapshot = VersionSnapshot {
            id: Uuid::new_v4(),
            assessment_id,
            version_number,
            created_by_role,
            label: label.unwrap_or_else(|| milestone_label(version_number)),
            created_at: Utc::now(),
            payload,
        };
        snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list(&self, assessment_id: Uuid) -> Result<Vec<VersionSnapshot>> {
        let mut out: Vec<VersionSnapshot> = self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.assessment_id == assessment_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.version_number);
        Ok(out)
    }

    async fn get(&self, snapshot_id: Uuid) -> Result<VersionSnapshot> {
        self.snapshots
            .read()
            .await
            .iter()
            .find(|s| s.id == snapshot_id)
            .cloned()
            .ok_or_else(|| DiagError::NotFound(format!("snapshot {snapshot_id}")))
    }

    async fn count(&self, assessment_id: Uuid) -> Result<u32> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.assessment_id == assessment_id)
            .count() as u32)
    }
}

#[derive(Default)]
pub struct MemClassroomStore {
    sessions: RwLock<HashMap<Uuid, ClassroomSession>>,
    participants: RwLock<Vec<ClassroomParticipant>>,
}

impl MemClassroomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClassroomStore for MemClassroomStore {
    async fn insert_session(&self, session: ClassroomSession) -> Result<ClassroomSession> {
        let mut sessions = self.sessions.write().await;
        if sessions.values().any(|s| s.code == session.code) {
            return Err(DiagError::Internal(anyhow::anyhow!(
                "room code {} already taken",
                session.code
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<ClassroomSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DiagError::NotFound(format!("classroom session {id}")))
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<ClassroomSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.code == code)
            .cloned())
    }

    async fn find_active_session_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<ClassroomSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.subject_id == subject_id && s.status == SessionStatus::Active)
            .cloned())
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<ClassroomSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| DiagError::NotFound(format!("classroom session {id}")))?;
        session.status = status;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn find_participant_by_email(
        &self,
        session_id: Uuid,
        email: &str,
    ) -> Result<Option<ClassroomParticipant>> {
        Ok(self
            .participants
            .read()
            .await
            .iter()
            .find(|p| p.session_id == session_id && p.email.as_deref() == Some(email))
            .cloned())
    }

    async fn insert_participant(
        &self,
        participant: ClassroomParticipant,
    ) -> Result<ClassroomParticipant> {
        self.participants.write().await.push(participant.clone());
        Ok(participant)
    }

    async fn count_participants(&self, session_id: Uuid) -> Result<u32> {
        Ok(self
            .participants
            .read()
            .await
            .iter()
            .filter(|p| p.session_id == session_id)
            .count() as u32)
    }
}

/// Audit sink that keeps entries in memory for assertions.
#[derive(Default)]
pub struct MemAuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    /// Actions recorded so far, in append order.
    pub async fn actions(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemAuditLog {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// The four ports wired to in-memory stores, ready to hand to the service.
pub struct MemStores {
    pub assessments: Arc<MemAssessmentStore>,
    pub snapshots: Arc<MemSnapshotStore>,
    pub classrooms: Arc<MemClassroomStore>,
    pub audit: Arc<MemAuditLog>,
}

impl MemStores {
    pub fn new() -> Self {
        Self {
            assessments: Arc::new(MemAssessmentStore::new()),
            snapshots: Arc::new(MemSnapshotStore::new()),
            classrooms: Arc::new(MemClassroomStore::new()),
            audit: Arc::new(MemAuditLog::new()),
        }
    }
}

impl Default for MemStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_snapshot_creation_is_gapless() {
        let store = Arc::new(MemSnapshotStore::new());
        let record = Assessment::new("2600054".into());
        let assessment_id = record.id;
        let payload = SnapshotPayload::capture(&record);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let payload = payload.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(assessment_id, Role::Consultant, None, payload)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut numbers: Vec<u32> = store
            .list(assessment_id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.version_number)
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=16).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn snapshot_numbering_is_per_assessment() {
        let store = MemSnapshotStore::new();
        let a = Assessment::new("2600054".into());
        let b = Assessment::new("2611606".into());

        let first = store
            .create(a.id, Role::Respondent, None, SnapshotPayload::capture(&a))
            .await
            .unwrap();
        let other = store
            .create(b.id, Role::Respondent, None, SnapshotPayload::capture(&b))
            .await
            .unwrap();

        assert_eq!(first.version_number, 1);
        assert_eq!(other.version_number, 1);
        assert_eq!(first.label, "T0");
    }

    fn session(subject_id: &str, code: &str) -> ClassroomSession {
        let now = Utc::now();
        ClassroomSession {
            id: Uuid::new_v4(),
            code: code.to_string(),
            token_hash: None,
            status: SessionStatus::Active,
            expires_at: None,
            subject_id: subject_id.to_string(),
            consultant_id: "consultant-1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_room_code_is_rejected() {
        let store = MemClassroomStore::new();
        store
            .insert_session(session("2600054", "ABC123"))
            .await
            .unwrap();
        assert!(store
            .insert_session(session("2611606", "ABC123"))
            .await
            .is_err());
    }
}
