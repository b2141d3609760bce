//! Postgres implementations of all diag_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. Axis responses and analyses are
//! child rows replaced wholesale on every aggregate write; snapshot numbering
//! serializes on a row lock of the parent assessment.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use diag_core::compare::milestone_label;
use diag_core::error::DiagError;
use diag_core::model::{
    Assessment, AuditLogEntry, AxisAnalysis, AxisResponse, BlockResponse, ClassroomParticipant,
    ClassroomSession, KeyQuestionAnswers, SnapshotPayload, VersionSnapshot,
};
use diag_core::ports::{
    AssessmentStore, AuditLog, ClassroomStore, Result, SnapshotStore,
};
use diag_core::types::{AssessmentStatus, Role, SessionStatus};

// ── Row types ─────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    subject_id: String,
    respondent_name: Option<String>,
    respondent_email: Option<String>,
    respondent_phone: Option<String>,
    consent: bool,
    assessment_date: DateTime<Utc>,
    status: String,
    classroom_session_id: Option<Uuid>,
    consultant_id: Option<String>,
    key_questions: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    finalized_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct AxisBlockRow {
    axis_key: String,
    block_key: String,
    checklist: serde_json::Value,
    narrative: Option<String>,
    score: Option<i16>,
    consultant_score: Option<i16>,
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    axis_key: String,
    positive_note: Option<String>,
    negative_note: Option<String>,
    solution_note: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    assessment_id: Uuid,
    version_number: i32,
    created_by_role: String,
    label: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    code: String,
    token_hash: Option<String>,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    subject_id: String,
    consultant_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    session_id: Uuid,
    name: String,
    email: Option<String>,
    role_label: Option<String>,
    organization: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> std::result::Result<AssessmentStatus, String> {
    AssessmentStatus::from_str(s).ok_or_else(|| format!("unknown assessment status {s}"))
}

fn parse_session_status(s: &str) -> std::result::Result<SessionStatus, String> {
    SessionStatus::from_str(s).ok_or_else(|| format!("unknown session status {s}"))
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("unknown role {s}"))
}

fn score_from_db(v: Option<i16>) -> std::result::Result<Option<u8>, String> {
    v.map(|v| u8::try_from(v).map_err(|_| format!("score {v} out of range")))
        .transpose()
}

fn internal(e: String) -> DiagError {
    DiagError::Internal(anyhow!(e))
}

impl TryFrom<SnapshotRow> for VersionSnapshot {
    type Error = String;

    fn try_from(r: SnapshotRow) -> std::result::Result<Self, String> {
        Ok(VersionSnapshot {
            id: r.id,
            assessment_id: r.assessment_id,
            version_number: u32::try_from(r.version_number)
                .map_err(|_| format!("version number {} out of range", r.version_number))?,
            created_by_role: parse_role(&r.created_by_role)?,
            label: r.label,
            payload: serde_json::from_value::<SnapshotPayload>(r.payload)
                .map_err(|e| e.to_string())?,
            created_at: r.created_at,
        })
    }
}

impl TryFrom<SessionRow> for ClassroomSession {
    type Error = String;

    fn try_from(r: SessionRow) -> std::result::Result<Self, String> {
        Ok(ClassroomSession {
            id: r.id,
            code: r.code,
            token_hash: r.token_hash,
            status: parse_session_status(&r.status)?,
            expires_at: r.expires_at,
            subject_id: r.subject_id,
            consultant_id: r.consultant_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl From<ParticipantRow> for ClassroomParticipant {
    fn from(r: ParticipantRow) -> Self {
        ClassroomParticipant {
            id: r.id,
            session_id: r.session_id,
            name: r.name,
            email: r.email,
            role_label: r.role_label,
            organization: r.organization,
            created_at: r.created_at,
        }
    }
}

// ── PgAssessmentStore ─────────────────────────────────────────

pub struct PgAssessmentStore {
    pool: PgPool,
}

impl PgAssessmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: Uuid) -> Result<Assessment> {
        let row = sqlx::query_as::<_, AssessmentRow>(
            r#"
            SELECT id, subject_id, respondent_name, respondent_email, respondent_phone,
                   consent, assessment_date, status, classroom_session_id, consultant_id,
                   key_questions, created_at, updated_at, submitted_at, finalized_at
            FROM assessments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| DiagError::NotFound(format!("assessment {id}")))?;

        let blocks = sqlx::query_as::<_, AxisBlockRow>(
            r#"
            SELECT axis_key, block_key, checklist, narrative, score, consultant_score
            FROM axis_responses
            WHERE assessment_id = $1
            ORDER BY position, block_key
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let mut axes: Vec<AxisResponse> = Vec::new();
        for row in blocks {
            let block = BlockResponse {
                checklist: serde_json::from_value(row.checklist)
                    .map_err(|e| internal(e.to_string()))?,
                narrative: row.narrative,
                score: score_from_db(row.score).map_err(internal)?,
                consultant_score: score_from_db(row.consultant_score).map_err(internal)?,
            };
            let axis = match axes.iter_mut().find(|a| a.axis_key == row.axis_key) {
                Some(a) => a,
                None => {
                    axes.push(AxisResponse {
                        axis_key: row.axis_key.clone(),
                        ..AxisResponse::default()
                    });
                    axes.last_mut().ok_or_else(|| internal("empty axes".into()))?
                }
            };
            match row.block_key.as_str() {
                "positive" => axis.positive = block,
                "negative" => axis.negative = block,
                "solution" => axis.solution = block,
                other => return Err(internal(format!("unknown block key {other}"))),
            }
        }

        let analyses = sqlx::query_as::<_, AnalysisRow>(
            r#"
            SELECT axis_key, positive_note, negative_note, solution_note
            FROM axis_analyses
            WHERE assessment_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .into_iter()
        .map(|r| AxisAnalysis {
            axis_key: r.axis_key,
            positive_note: r.positive_note,
            negative_note: r.negative_note,
            solution_note: r.solution_note,
        })
        .collect();

        let key_questions = row
            .key_questions
            .map(serde_json::from_value::<KeyQuestionAnswers>)
            .transpose()
            .map_err(|e| internal(e.to_string()))?;

        Ok(Assessment {
            id: row.id,
            subject_id: row.subject_id,
            respondent_name: row.respondent_name,
            respondent_email: row.respondent_email,
            respondent_phone: row.respondent_phone,
            consent: row.consent,
            assessment_date: row.assessment_date,
            status: parse_status(&row.status).map_err(internal)?,
            classroom_session_id: row.classroom_session_id,
            consultant_id: row.consultant_id,
            axes,
            analyses,
            key_questions,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            finalized_at: row.finalized_at,
        })
    }

    /// Replace all child rows of the aggregate inside the caller's tx.
    async fn write_children(
        tx: &mut Transaction<'_, Postgres>,
        assessment: &Assessment,
    ) -> Result<()> {
        sqlx::query("DELETE FROM axis_responses WHERE assessment_id = $1")
            .bind(assessment.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| anyhow!(e))?;
        sqlx::query("DELETE FROM axis_analyses WHERE assessment_id = $1")
            .bind(assessment.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| anyhow!(e))?;

        for (position, axis) in assessment.axes.iter().enumerate() {
            for (block_key, block) in [
                ("positive", &axis.positive),
                ("negative", &axis.negative),
                ("solution", &axis.solution),
            ] {
                let checklist = serde_json::to_value(&block.checklist)
                    .map_err(|e| internal(e.to_string()))?;
                sqlx::query(
                    r#"
                    INSERT INTO axis_responses (
                        id, assessment_id, axis_key, block_key, position,
                        checklist, narrative, score, consultant_score
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(assessment.id)
                .bind(&axis.axis_key)
                .bind(block_key)
                .bind(position as i16)
                .bind(&checklist)
                .bind(&block.narrative)
                .bind(block.score.map(i16::from))
                .bind(block.consultant_score.map(i16::from))
                .execute(&mut **tx)
                .await
                .map_err(|e| anyhow!(e))?;
            }
        }

        for (position, analysis) in assessment.analyses.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO axis_analyses (
                    id, assessment_id, axis_key, position,
                    positive_note, negative_note, solution_note
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(assessment.id)
            .bind(&analysis.axis_key)
            .bind(position as i16)
            .bind(&analysis.positive_note)
            .bind(&analysis.negative_note)
            .bind(&analysis.solution_note)
            .execute(&mut **tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        Ok(())
    }

    fn key_questions_json(assessment: &Assessment) -> Result<Option<serde_json::Value>> {
        assessment
            .key_questions
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| internal(e.to_string()))
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn insert(&self, assessment: Assessment) -> Result<Assessment> {
        let key_questions = Self::key_questions_json(&assessment)?;
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        sqlx::query(
            r#"
            INSERT INTO assessments (
                id, subject_id, respondent_name, respondent_email, respondent_phone,
                consent, assessment_date, status, classroom_session_id, consultant_id,
                key_questions, created_at, updated_at, submitted_at, finalized_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(assessment.id)
        .bind(&assessment.subject_id)
        .bind(&assessment.respondent_name)
        .bind(&assessment.respondent_email)
        .bind(&assessment.respondent_phone)
        .bind(assessment.consent)
        .bind(assessment.assessment_date)
        .bind(assessment.status.as_str())
        .bind(assessment.classroom_session_id)
        .bind(&assessment.consultant_id)
        .bind(&key_questions)
        .bind(assessment.created_at)
        .bind(assessment.updated_at)
        .bind(assessment.submitted_at)
        .bind(assessment.finalized_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        Self::write_children(&mut tx, &assessment).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(assessment)
    }

    async fn update(&self, assessment: Assessment) -> Result<Assessment> {
        let key_questions = Self::key_questions_json(&assessment)?;
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let result = sqlx::query(
            r#"
            UPDATE assessments SET
                subject_id = $2, respondent_name = $3, respondent_email = $4,
                respondent_phone = $5, consent = $6, assessment_date = $7,
                status = $8, classroom_session_id = $9, consultant_id = $10,
                key_questions = $11, updated_at = $12, submitted_at = $13,
                finalized_at = $14
            WHERE id = $1
            "#,
        )
        .bind(assessment.id)
        .bind(&assessment.subject_id)
        .bind(&assessment.respondent_name)
        .bind(&assessment.respondent_email)
        .bind(&assessment.respondent_phone)
        .bind(assessment.consent)
        .bind(assessment.assessment_date)
        .bind(assessment.status.as_str())
        .bind(assessment.classroom_session_id)
        .bind(&assessment.consultant_id)
        .bind(&key_questions)
        .bind(assessment.updated_at)
        .bind(assessment.submitted_at)
        .bind(assessment.finalized_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(DiagError::NotFound(format!("assessment {}", assessment.id)));
        }

        Self::write_children(&mut tx, &assessment).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(assessment)
    }

    async fn get(&self, id: Uuid) -> Result<Assessment> {
        self.load(id).await
    }

    async fn find_by_session(&self, session_id: Uuid) -> Result<Option<Assessment>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM assessments
            WHERE classroom_session_id = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match id {
            Some(id) => Ok(Some(self.load(id).await?)),
            None => Ok(None),
        }
    }

    async fn count_by_session(&self, session_id: Uuid) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessments WHERE classroom_session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        u32::try_from(n).map_err(|_| internal(format!("assessment count {n} out of range")))
    }
}

// ── PgSnapshotStore ───────────────────────────────────────────

pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn create(
        &self,
        assessment_id: Uuid,
        created_by_role: Role,
        label: Option<String>,
        payload: SnapshotPayload,
    ) -> Result<VersionSnapshot> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        // Row lock on the parent serializes numbering; the unique index on
        // (assessment_id, version_number) backs it up.
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM assessments WHERE id = $1 FOR UPDATE",
        )
        .bind(assessment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        if locked.is_none() {
            return Err(DiagError::NotFound(format!("assessment {assessment_id}")));
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM version_snapshots WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        let version_number = u32::try_from(existing + 1)
            .map_err(|_| internal(format!("version count {existing} out of range")))?;

        let snapshot = VersionSnapshot {
            id: Uuid::new_v4(),
            assessment_id,
            version_number,
            created_by_role,
            label: label.unwrap_or_else(|| milestone_label(version_number)),
            created_at: Utc::now(),
            payload,
        };
        let payload_json =
            serde_json::to_value(&snapshot.payload).map_err(|e| internal(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO version_snapshots (
                id, assessment_id, version_number, created_by_role, label, payload, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.assessment_id)
        .bind(snapshot.version_number as i32)
        .bind(snapshot.created_by_role.as_str())
        .bind(&snapshot.label)
        .bind(&payload_json)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(snapshot)
    }

    async fn list(&self, assessment_id: Uuid) -> Result<Vec<VersionSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, assessment_id, version_number, created_by_role, label, payload, created_at
            FROM version_snapshots
            WHERE assessment_id = $1
            ORDER BY version_number
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(internal))
            .collect()
    }

    async fn get(&self, snapshot_id: Uuid) -> Result<VersionSnapshot> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, assessment_id, version_number, created_by_role, label, payload, created_at
            FROM version_snapshots
            WHERE id = $1
            "#,
        )
        .bind(snapshot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| DiagError::NotFound(format!("snapshot {snapshot_id}")))?;
        row.try_into().map_err(internal)
    }

    async fn count(&self, assessment_id: Uuid) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM version_snapshots WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        u32::try_from(n).map_err(|_| internal(format!("snapshot count {n} out of range")))
    }
}

// ── PgClassroomStore ──────────────────────────────────────────

pub struct PgClassroomStore {
    pool: PgPool,
}

impl PgClassroomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SESSION_COLUMNS: &str = "id, code, token_hash, status, expires_at, subject_id, \
     consultant_id, created_at, updated_at";

#[async_trait]
impl ClassroomStore for PgClassroomStore {
    async fn insert_session(&self, session: ClassroomSession) -> Result<ClassroomSession> {
        sqlx::query(
            r#"
            INSERT INTO classroom_sessions (
                id, code, token_hash, status, expires_at, subject_id,
                consultant_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(&session.code)
        .bind(&session.token_hash)
        .bind(session.status.as_str())
        .bind(session.expires_at)
        .bind(&session.subject_id)
        .bind(&session.consultant_id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<ClassroomSession> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM classroom_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| DiagError::NotFound(format!("classroom session {id}")))?;
        row.try_into().map_err(internal)
    }

    async fn find_session_by_code(&self, code: &str) -> Result<Option<ClassroomSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM classroom_sessions WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| r.try_into().map_err(internal)).transpose()
    }

    async fn find_active_session_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<ClassroomSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM classroom_sessions
            WHERE subject_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| r.try_into().map_err(internal)).transpose()
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<ClassroomSession> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE classroom_sessions
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| DiagError::NotFound(format!("classroom session {id}")))?;
        row.try_into().map_err(internal)
    }

    async fn find_participant_by_email(
        &self,
        session_id: Uuid,
        email: &str,
    ) -> Result<Option<ClassroomParticipant>> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT id, session_id, name, email, role_label, organization, created_at
            FROM classroom_participants
            WHERE session_id = $1 AND email = $2
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(ClassroomParticipant::from))
    }

    async fn insert_participant(
        &self,
        participant: ClassroomParticipant,
    ) -> Result<ClassroomParticipant> {
        sqlx::query(
            r#"
            INSERT INTO classroom_participants (
                id, session_id, name, email, role_label, organization, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(participant.id)
        .bind(participant.session_id)
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(&participant.role_label)
        .bind(&participant.organization)
        .bind(participant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(participant)
    }

    async fn count_participants(&self, session_id: Uuid) -> Result<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM classroom_participants WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        u32::try_from(n).map_err(|_| internal(format!("participant count {n} out of range")))
    }
}

// ── PgAuditLog ────────────────────────────────────────────────

pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                entity, entity_id, action, actor_id, ip_address,
                user_agent, request_id, data, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(&entry.actor.actor_id)
        .bind(&entry.actor.ip_address)
        .bind(&entry.actor.user_agent)
        .bind(&entry.actor.request_id)
        .bind(&entry.data)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

/// All four adapters over one pool, ready to hand to the service.
pub struct PgStores {
    pub assessments: Arc<PgAssessmentStore>,
    pub snapshots: Arc<PgSnapshotStore>,
    pub classrooms: Arc<PgClassroomStore>,
    pub audit: Arc<PgAuditLog>,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            assessments: Arc::new(PgAssessmentStore::new(pool.clone())),
            snapshots: Arc::new(PgSnapshotStore::new(pool.clone())),
            classrooms: Arc::new(PgClassroomStore::new(pool.clone())),
            audit: Arc::new(PgAuditLog::new(pool)),
        }
    }
}
