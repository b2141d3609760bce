//! Diagnostics lifecycle service.
//!
//! `DiagService` is the single entry point the HTTP layer talks to. The
//! implementation composes the storage ports and owns every rule that spans
//! more than one of them: classroom resolution on save, optimistic-concurrency
//! detection against the snapshot counter, status transitions, and audit
//! logging around each operation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::axes;
use crate::classroom;
use crate::compare::{self, ComparisonReport, SnapshotSummary};
use crate::editability;
use crate::error::DiagError;
use crate::model::{
    ActorContext, Assessment, AuditLogEntry, AxisResponse, ClassroomParticipant, ClassroomSession,
    KeyQuestionAnswers, SnapshotPayload, VersionSnapshot,
};
use crate::ports::{
    log_audit, AssessmentStore, AuditLog, ClassroomStore, Result, SnapshotStore,
};
use crate::proto::{
    ConsultantSaveOutcome, ConsultantSaveRequest, CreateSessionRequest, CreateSessionResponse,
    JoinOutcome, JoinRequest, MilestoneOutcome, MilestoneRequest, SaveOutcome, SaveRequest,
    SessionOverview, SubmitOutcome, SubmitRequest,
};
use crate::types::{AssessmentStatus, FieldGroup, Role, SessionStatus};
use crate::workflow;

/// Attempts made to find an unused room code before giving up.
const CODE_ATTEMPTS: usize = 6;

#[async_trait]
pub trait DiagService: Send + Sync {
    /// Opens a classroom session for a subject. Consultant-only.
    async fn create_session(
        &self,
        actor: &ActorContext,
        req: CreateSessionRequest,
    ) -> Result<CreateSessionResponse>;

    /// Moves a session to a new status, enforcing the one-active-per-subject rule.
    async fn set_session_status(
        &self,
        actor: &ActorContext,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<ClassroomSession>;

    /// Live read-out of a session with its participant and assessment counts.
    async fn session_overview(&self, session_id: Uuid) -> Result<SessionOverview>;

    /// Resolves an anonymous join request into a participant record.
    async fn resolve_join(&self, actor: &ActorContext, req: JoinRequest) -> Result<JoinOutcome>;

    /// Respondent save path: creates or updates the draft, reports conflicts.
    async fn save(&self, actor: &ActorContext, req: SaveRequest) -> Result<SaveOutcome>;

    /// Submits an assessment for review, snapshotting it as it stood.
    async fn submit(
        &self,
        actor: &ActorContext,
        assessment_id: Uuid,
        req: SubmitRequest,
    ) -> Result<SubmitOutcome>;

    /// Consultant save path: analyses, override scores, optional status change.
    async fn consultant_save(
        &self,
        actor: &ActorContext,
        assessment_id: Uuid,
        req: ConsultantSaveRequest,
    ) -> Result<ConsultantSaveOutcome>;

    /// Records a labelled milestone snapshot. Consultant-only.
    async fn register_milestone(
        &self,
        actor: &ActorContext,
        role: Role,
        assessment_id: Uuid,
        req: MilestoneRequest,
    ) -> Result<MilestoneOutcome>;

    async fn get_assessment(&self, assessment_id: Uuid) -> Result<Assessment>;

    /// All snapshots of an assessment, oldest first.
    async fn list_versions(&self, assessment_id: Uuid) -> Result<Vec<VersionSnapshot>>;

    /// Scored one-line summaries of every snapshot, oldest first.
    async fn version_summaries(&self, assessment_id: Uuid) -> Result<Vec<SnapshotSummary>>;

    /// Compares two snapshots of the given assessment.
    async fn compare_versions(
        &self,
        assessment_id: Uuid,
        from: Uuid,
        to: Uuid,
    ) -> Result<ComparisonReport>;
}

pub struct DiagServiceImpl {
    assessments: Arc<dyn AssessmentStore>,
    snapshots: Arc<dyn SnapshotStore>,
    classrooms: Arc<dyn ClassroomStore>,
    audit: Arc<dyn AuditLog>,
}

impl DiagServiceImpl {
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        snapshots: Arc<dyn SnapshotStore>,
        classrooms: Arc<dyn ClassroomStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            assessments,
            snapshots,
            classrooms,
            audit,
        }
    }

    /// Looks the session up by id or code and checks it is joinable.
    async fn resolve_open_session(
        &self,
        session_id: Option<Uuid>,
        code: Option<&str>,
    ) -> Result<ClassroomSession> {
        let session = match (session_id, code) {
            (Some(id), _) => self.classrooms.get_session(id).await?,
            (None, Some(code)) => {
                let code = classroom::normalize_code(code);
                self.classrooms
                    .find_session_by_code(&code)
                    .await?
                    .ok_or_else(|| DiagError::NotFound(format!("classroom session {code}")))?
            }
            (None, None) => {
                return Err(DiagError::ValidationFailed(
                    "a session id or room code is required".into(),
                ))
            }
        };
        if classroom::is_expired(session.expires_at, Utc::now()) {
            return Err(DiagError::Expired(format!(
                "classroom session {} has expired",
                session.code
            )));
        }
        if !classroom::can_join(session.status) {
            return Err(DiagError::StatusBlocked(format!(
                "classroom session {} is {}",
                session.code, session.status
            )));
        }
        Ok(session)
    }

    /// Verifies a supplied token against the session hash. A missing token is
    /// accepted when the session carries no hash; when a hash exists the token
    /// is only checked if present, matching the low-friction join flow.
    fn check_optional_token(session: &ClassroomSession, token: Option<&str>) -> Result<()> {
        if let (Some(hash), Some(token)) = (session.token_hash.as_deref(), token) {
            if !classroom::verify_token(token, hash) {
                return Err(DiagError::InvalidToken);
            }
        }
        Ok(())
    }

    /// Strict credential check for classroom-scoped submit and version access:
    /// code and token must both be present and the token must verify.
    async fn authorize_classroom_pair(
        &self,
        code: Option<&str>,
        token: Option<&str>,
    ) -> Result<ClassroomSession> {
        let (code, token) = match (code, token) {
            (Some(c), Some(t)) => (c, t),
            _ => {
                return Err(DiagError::ClassroomCredentialMissing(
                    "room code and token are both required".into(),
                ))
            }
        };
        let code = classroom::normalize_code(code);
        let session = self
            .classrooms
            .find_session_by_code(&code)
            .await?
            .ok_or_else(|| DiagError::NotFound(format!("classroom session {code}")))?;
        let hash = session.token_hash.as_deref().ok_or_else(|| {
            DiagError::ClassroomCredentialMissing(format!(
                "classroom session {code} has no token configured"
            ))
        })?;
        if !classroom::verify_token(token, hash) {
            return Err(DiagError::InvalidToken);
        }
        Ok(session)
    }

    async fn join_inner(&self, req: &JoinRequest) -> Result<(ClassroomSession, ClassroomParticipant)> {
        let session = self
            .resolve_open_session(req.session_id, req.code.as_deref())
            .await?;
        Self::check_optional_token(&session, req.token.as_deref())?;

        let email = req
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if let Some(email) = &email {
            if let Some(existing) = self
                .classrooms
                .find_participant_by_email(session.id, email)
                .await?
            {
                return Ok((session, existing));
            }
        }

        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Participant")
            .to_string();
        let participant = ClassroomParticipant {
            id: Uuid::new_v4(),
            session_id: session.id,
            name,
            email,
            role_label: req.role_label.clone(),
            organization: req.organization.clone(),
            created_at: Utc::now(),
        };
        let participant = self.classrooms.insert_participant(participant).await?;
        Ok((session, participant))
    }

    /// Resolves the classroom context of a respondent save, if any, and the
    /// assessment the save should land on.
    async fn resolve_save_target(
        &self,
        req: &SaveRequest,
    ) -> Result<(Option<ClassroomSession>, Option<Assessment>)> {
        if req.classroom_code.is_some() || req.classroom_token.is_some() {
            let (code, token) = match (req.classroom_code.as_deref(), req.classroom_token.as_deref())
            {
                (Some(c), Some(t)) => (c, t),
                _ => {
                    return Err(DiagError::ClassroomCredentialMissing(
                        "room code and token must be supplied together".into(),
                    ))
                }
            };
            let session = self.resolve_open_session(None, Some(code)).await?;
            Self::check_optional_token(&session, Some(token))?;
            let existing = self.assessments.find_by_session(session.id).await?;
            return Ok((Some(session), existing));
        }

        if let Some(session_id) = req.classroom_session_id {
            let session = self.classrooms.get_session(session_id).await?;
            if classroom::is_expired(session.expires_at, Utc::now()) {
                // Past the deadline the draft is treated as final: flip it to
                // submitted before rejecting so the respondent's last state is
                // what the consultant reviews.
                if let Some(id) = req.assessment_id {
                    if let Ok(mut record) = self.assessments.get(id).await {
                        if record.status == AssessmentStatus::Draft
                            || record.status == AssessmentStatus::Returned
                        {
                            record.status = AssessmentStatus::Submitted;
                            record.submitted_at = Some(Utc::now());
                            record.updated_at = Utc::now();
                            let _ = self.assessments.update(record).await;
                        }
                    }
                }
                return Err(DiagError::Expired(format!(
                    "classroom session {} has expired; the assessment was closed as submitted",
                    session.code
                )));
            }
            if !classroom::can_join(session.status) {
                return Err(DiagError::StatusBlocked(format!(
                    "classroom session {} is {}",
                    session.code, session.status
                )));
            }
            let existing = self.assessments.find_by_session(session.id).await?;
            return Ok((Some(session), existing));
        }

        Ok((None, None))
    }

    /// Guards the classroom credentials attached to a submit or version read.
    /// Returns the session when the caller is classroom-scoped.
    async fn authorize_assessment_access(
        &self,
        assessment: &Assessment,
        req: &SubmitRequest,
    ) -> Result<Option<ClassroomSession>> {
        if let Some(session_id) = req.classroom_session_id {
            let session = self.classrooms.get_session(session_id).await?;
            // An expired room may still submit: the room closing is exactly
            // when final submissions arrive.
            if !classroom::can_join(session.status) {
                return Err(DiagError::StatusBlocked(format!(
                    "classroom session {} is {}",
                    session.code, session.status
                )));
            }
            if assessment.classroom_session_id != Some(session.id) {
                return Err(DiagError::Forbidden(
                    "assessment does not belong to this classroom session".into(),
                ));
            }
            return Ok(Some(session));
        }
        if req.classroom_code.is_some() || req.classroom_token.is_some() {
            let session = self
                .authorize_classroom_pair(
                    req.classroom_code.as_deref(),
                    req.classroom_token.as_deref(),
                )
                .await?;
            if assessment.classroom_session_id != Some(session.id) {
                return Err(DiagError::Forbidden(
                    "assessment does not belong to this classroom session".into(),
                ));
            }
            return Ok(Some(session));
        }
        Ok(None)
    }

    fn validate_axes(axes_in: &[AxisResponse]) -> Result<()> {
        for axis in axes_in {
            if !axes::is_known_axis(&axis.axis_key) {
                return Err(DiagError::ValidationFailed(format!(
                    "unknown axis {}",
                    axis.axis_key
                )));
            }
            for key in axes::BLOCK_KEYS {
                let block = match axis.block(key) {
                    Some(b) => b,
                    None => continue,
                };
                if let Some(score) = block.score {
                    if score > 10 {
                        return Err(DiagError::ValidationFailed(format!(
                            "score {score} out of range for axis {} block {key}",
                            axis.axis_key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Merges incoming respondent axes over the stored record, keeping every
    /// consultant override score the respondent cannot touch.
    fn merge_respondent_axes(record: &Assessment, incoming: Vec<AxisResponse>) -> Vec<AxisResponse> {
        incoming
            .into_iter()
            .map(|mut axis| {
                if let Some(stored) = record.axis(&axis.axis_key) {
                    axis.positive.consultant_score = stored.positive.consultant_score;
                    axis.negative.consultant_score = stored.negative.consultant_score;
                    axis.solution.consultant_score = stored.solution.consultant_score;
                }
                axis
            })
            .collect()
    }

    async fn snapshot_now(
        &self,
        record: &Assessment,
        role: Role,
        label: Option<String>,
    ) -> Result<VersionSnapshot> {
        let payload = SnapshotPayload::capture(record);
        self.snapshots.create(record.id, role, label, payload).await
    }

}

#[async_trait]
impl DiagService for DiagServiceImpl {
    async fn create_session(
        &self,
        actor: &ActorContext,
        req: CreateSessionRequest,
    ) -> Result<CreateSessionResponse> {
        let subject_id = req.subject_id.trim().to_string();
        if subject_id.is_empty() {
            return Err(DiagError::ValidationFailed("subject_id is required".into()));
        }
        if let Some(active) = self
            .classrooms
            .find_active_session_for_subject(&subject_id)
            .await?
        {
            return Err(DiagError::StatusBlocked(format!(
                "subject {subject_id} already has active classroom session {}",
                active.code
            )));
        }

        let consultant_id = actor.actor_id.clone().ok_or_else(|| {
            DiagError::Forbidden("a consultant identity is required to open a classroom".into())
        })?;

        let token = if req.with_token {
            Some(classroom::generate_magic_token())
        } else {
            None
        };
        let token_hash = token.as_deref().map(classroom::hash_token);
        let expires_at = Some(
            req.expires_at
                .unwrap_or_else(|| classroom::default_expiry(Utc::now())),
        );

        let mut created = None;
        for _ in 0..CODE_ATTEMPTS {
            let now = Utc::now();
            let candidate = ClassroomSession {
                id: Uuid::new_v4(),
                code: classroom::generate_room_code(),
                token_hash: token_hash.clone(),
                status: SessionStatus::Active,
                expires_at,
                subject_id: subject_id.clone(),
                consultant_id: consultant_id.clone(),
                created_at: now,
                updated_at: now,
            };
            // Code collisions surface as insert errors; just roll a new code.
            match self.classrooms.insert_session(candidate.clone()).await {
                Ok(session) => {
                    created = Some(session);
                    break;
                }
                Err(_) => continue,
            }
        }
        let session = created.ok_or_else(|| {
            DiagError::Internal(anyhow::anyhow!(
                "could not allocate a unique room code after {CODE_ATTEMPTS} attempts"
            ))
        })?;

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "classroom_session",
                session.id.to_string(),
                "CREATE",
                actor,
                serde_json::json!({
                    "code": session.code,
                    "status": session.status,
                    "subject_id": session.subject_id,
                }),
            ),
        )
        .await;

        Ok(CreateSessionResponse {
            session_id: session.id,
            code: session.code,
            token,
            status: session.status,
            subject_id: session.subject_id,
            expires_at: session.expires_at,
        })
    }

    async fn set_session_status(
        &self,
        actor: &ActorContext,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<ClassroomSession> {
        let existing = self.classrooms.get_session(session_id).await?;
        if status == SessionStatus::Active {
            if let Some(other) = self
                .classrooms
                .find_active_session_for_subject(&existing.subject_id)
                .await?
            {
                if other.id != existing.id {
                    return Err(DiagError::StatusBlocked(format!(
                        "subject {} already has active classroom session {}",
                        existing.subject_id, other.code
                    )));
                }
            }
        }
        let updated = self
            .classrooms
            .update_session_status(session_id, status)
            .await?;

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "classroom_session",
                updated.id.to_string(),
                "UPDATE",
                actor,
                serde_json::json!({
                    "prev_status": existing.status,
                    "status": updated.status,
                }),
            ),
        )
        .await;

        Ok(updated)
    }

    async fn session_overview(&self, session_id: Uuid) -> Result<SessionOverview> {
        let session = self.classrooms.get_session(session_id).await?;
        let participant_count = self.classrooms.count_participants(session_id).await?;
        let assessment_count = self.assessments.count_by_session(session_id).await?;
        Ok(SessionOverview {
            session_id: session.id,
            code: session.code,
            status: session.status,
            subject_id: session.subject_id,
            expires_at: session.expires_at,
            participant_count,
            assessment_count,
        })
    }

    async fn resolve_join(&self, actor: &ActorContext, req: JoinRequest) -> Result<JoinOutcome> {
        let attempted = req
            .code
            .as_deref()
            .map(classroom::normalize_code)
            .or_else(|| req.session_id.map(|id| id.to_string()))
            .unwrap_or_default();

        match self.join_inner(&req).await {
            Ok((session, participant)) => {
                log_audit(
                    self.audit.as_ref(),
                    AuditLogEntry::new(
                        "classroom_session",
                        session.id.to_string(),
                        "JOIN_SUCCESS",
                        actor,
                        serde_json::json!({
                            "code": session.code,
                            "participant_id": participant.id,
                            "name": participant.name,
                        }),
                    ),
                )
                .await;
                Ok(JoinOutcome {
                    session_id: session.id,
                    code: session.code,
                    participant_id: participant.id,
                    status: session.status,
                    subject_id: session.subject_id,
                })
            }
            Err(err) => {
                let action = match &err {
                    DiagError::Internal(_) => "JOIN_ERROR",
                    _ => "JOIN_FAILED",
                };
                log_audit(
                    self.audit.as_ref(),
                    AuditLogEntry::new(
                        "classroom_session",
                        attempted,
                        action,
                        actor,
                        serde_json::json!({ "reason": err.reason() }),
                    ),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn save(&self, actor: &ActorContext, req: SaveRequest) -> Result<SaveOutcome> {
        let (session, session_assessment) = self.resolve_save_target(&req).await?;

        let existing = match req.assessment_id {
            Some(id) => Some(self.assessments.get(id).await?),
            None => session_assessment,
        };
        let creating = existing.is_none();

        let subject_id = req
            .subject_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| session.as_ref().map(|s| s.subject_id.clone()))
            .or_else(|| existing.as_ref().map(|a| a.subject_id.clone()))
            .ok_or_else(|| DiagError::ValidationFailed("subject_id is required".into()))?;

        let mut record = existing.unwrap_or_else(|| Assessment::new(subject_id.clone()));
        editability::ensure_editable(Role::Respondent, record.status, FieldGroup::RespondentFields)?;
        Self::validate_axes(&req.axes)?;

        record.subject_id = subject_id;
        record.respondent_name = req.respondent_name.clone();
        record.respondent_email = req.respondent_email.clone();
        record.respondent_phone = req.respondent_phone.clone();
        record.consent = req.consent;
        if let Some(date) = req.assessment_date {
            record.assessment_date = date;
        }
        let merged_axes = Self::merge_respondent_axes(&record, req.axes.clone());
        record.axes = merged_axes;
        if let Some(session) = &session {
            record.classroom_session_id = Some(session.id);
        }
        if let Some(incoming) = &req.key_questions {
            // The consultant commentary inside is not the respondent's to set.
            let commentary = record
                .key_questions
                .as_ref()
                .and_then(|kq| kq.consultant_commentary.clone());
            record.key_questions = Some(KeyQuestionAnswers {
                answers: incoming.answers.clone(),
                consultant_commentary: commentary,
            });
        }

        let mut status_changed = false;
        if let Some(target) = req.status {
            if target != record.status {
                workflow::check_transition(&record, target, Role::Respondent)?;
                record.status = target;
                if target == AssessmentStatus::Submitted {
                    record.submitted_at = Some(Utc::now());
                }
                status_changed = true;
            }
        }
        record.updated_at = Utc::now();

        // The snapshot counter is the version clock. A stale base means some
        // other writer snapshotted since this client last loaded; the write
        // still lands, the flag tells the client to reconcile.
        let persisted_versions = self.snapshots.count(record.id).await?;
        let conflict_detected = req
            .base_version_number
            .map(|base| base != persisted_versions)
            .unwrap_or(false);

        let record = if creating {
            self.assessments.insert(record).await?
        } else {
            self.assessments.update(record).await?
        };

        let current_version_number = if status_changed {
            self.snapshot_now(&record, Role::Respondent, None).await?;
            persisted_versions + 1
        } else {
            persisted_versions
        };

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "assessment",
                record.id.to_string(),
                if creating { "CREATE" } else { "UPDATE" },
                actor,
                serde_json::json!({
                    "status": record.status,
                    "conflict_detected": conflict_detected,
                    "classroom_session_id": record.classroom_session_id,
                }),
            ),
        )
        .await;

        Ok(SaveOutcome {
            id: record.id,
            current_version_number,
            conflict_detected,
        })
    }

    async fn submit(
        &self,
        actor: &ActorContext,
        assessment_id: Uuid,
        req: SubmitRequest,
    ) -> Result<SubmitOutcome> {
        let mut record = self.assessments.get(assessment_id).await?;
        self.authorize_assessment_access(&record, &req).await?;

        workflow::check_transition(&record, AssessmentStatus::Submitted, Role::Respondent)?;
        record.status = AssessmentStatus::Submitted;
        record.submitted_at = Some(Utc::now());
        record.updated_at = Utc::now();
        let record = self.assessments.update(record).await?;

        self.snapshot_now(&record, Role::Respondent, None).await?;

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "assessment",
                record.id.to_string(),
                "SUBMIT",
                actor,
                serde_json::json!({ "status": record.status }),
            ),
        )
        .await;

        let versions = self
            .snapshots
            .list(record.id)
            .await?
            .iter()
            .map(compare::summarize)
            .collect();

        Ok(SubmitOutcome {
            id: record.id,
            status: record.status,
            versions,
        })
    }

    async fn consultant_save(
        &self,
        actor: &ActorContext,
        assessment_id: Uuid,
        req: ConsultantSaveRequest,
    ) -> Result<ConsultantSaveOutcome> {
        let mut record = self.assessments.get(assessment_id).await?;
        editability::ensure_editable(Role::Consultant, record.status, FieldGroup::ConsultantFields)?;

        for score in &req.scores {
            if !axes::is_known_axis(&score.axis_key) {
                return Err(DiagError::ValidationFailed(format!(
                    "unknown axis {}",
                    score.axis_key
                )));
            }
            for value in [score.positive, score.negative, score.solution]
                .into_iter()
                .flatten()
            {
                if value > 10 {
                    return Err(DiagError::ValidationFailed(format!(
                        "score {value} out of range for axis {}",
                        score.axis_key
                    )));
                }
            }
        }

        if let Some(analyses) = req.analyses {
            record.analyses = analyses;
        }
        for score in &req.scores {
            if let Some(axis) = record.axes.iter_mut().find(|a| a.axis_key == score.axis_key) {
                if score.positive.is_some() {
                    axis.positive.consultant_score = score.positive;
                }
                if score.negative.is_some() {
                    axis.negative.consultant_score = score.negative;
                }
                if score.solution.is_some() {
                    axis.solution.consultant_score = score.solution;
                }
            }
        }
        if let Some(commentary) = req.key_question_commentary {
            match record.key_questions.as_mut() {
                Some(kq) => kq.consultant_commentary = Some(commentary),
                None => {
                    record.key_questions = Some(KeyQuestionAnswers {
                        answers: serde_json::Value::Null,
                        consultant_commentary: Some(commentary),
                    })
                }
            }
        }

        // A first consultant save moves a submitted assessment into review;
        // otherwise the current status holds unless one was asked for.
        let target = req.status.unwrap_or(match record.status {
            AssessmentStatus::Submitted => AssessmentStatus::InReview,
            other => other,
        });
        if target != record.status {
            workflow::check_transition(&record, target, Role::Consultant)?;
            record.status = target;
            if target == AssessmentStatus::Finalized {
                record.finalized_at = Some(Utc::now());
            }
        }
        record.updated_at = Utc::now();
        if record.consultant_id.is_none() {
            record.consultant_id = actor.actor_id.clone();
        }
        let record = self.assessments.update(record).await?;

        // Every consultant save is snapshotted so the review trail is complete.
        self.snapshot_now(&record, Role::Consultant, None).await?;
        let current_version_number = self.snapshots.count(record.id).await?;

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "assessment",
                record.id.to_string(),
                "CONSULTANT_UPDATE",
                actor,
                serde_json::json!({ "status": record.status }),
            ),
        )
        .await;

        Ok(ConsultantSaveOutcome {
            id: record.id,
            status: record.status,
            current_version_number,
        })
    }

    async fn register_milestone(
        &self,
        actor: &ActorContext,
        role: Role,
        assessment_id: Uuid,
        req: MilestoneRequest,
    ) -> Result<MilestoneOutcome> {
        if role != Role::Consultant {
            log_audit(
                self.audit.as_ref(),
                AuditLogEntry::new(
                    "assessment",
                    assessment_id.to_string(),
                    "MILESTONE_DENIED",
                    actor,
                    serde_json::json!({ "role": role }),
                ),
            )
            .await;
            return Err(DiagError::Forbidden(
                "only consultants may register milestones".into(),
            ));
        }

        let record = self.assessments.get(assessment_id).await?;
        let label = req
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let snapshot = self.snapshot_now(&record, Role::Consultant, label).await?;

        log_audit(
            self.audit.as_ref(),
            AuditLogEntry::new(
                "assessment",
                record.id.to_string(),
                "MILESTONE_CREATED",
                actor,
                serde_json::json!({
                    "label": snapshot.label,
                    "version_number": snapshot.version_number,
                }),
            ),
        )
        .await;

        Ok(MilestoneOutcome {
            id: record.id,
            version_number: snapshot.version_number,
            label: snapshot.label,
        })
    }

    async fn get_assessment(&self, assessment_id: Uuid) -> Result<Assessment> {
        self.assessments.get(assessment_id).await
    }

    async fn list_versions(&self, assessment_id: Uuid) -> Result<Vec<VersionSnapshot>> {
        // 404 for an unknown assessment rather than an empty list.
        let _ = self.assessments.get(assessment_id).await?;
        self.snapshots.list(assessment_id).await
    }

    async fn version_summaries(&self, assessment_id: Uuid) -> Result<Vec<SnapshotSummary>> {
        Ok(self
            .list_versions(assessment_id)
            .await?
            .iter()
            .map(compare::summarize)
            .collect())
    }

    async fn compare_versions(
        &self,
        assessment_id: Uuid,
        from: Uuid,
        to: Uuid,
    ) -> Result<ComparisonReport> {
        let a = self.snapshots.get(from).await?;
        let b = self.snapshots.get(to).await?;
        if a.assessment_id != assessment_id || b.assessment_id != assessment_id {
            return Err(DiagError::ValidationFailed(
                "snapshots do not belong to this assessment".into(),
            ));
        }
        Ok(compare::compare(&a, &b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemStores;
    use crate::model::BlockResponse;
    use crate::proto::ConsultantScores;

    fn service() -> (DiagServiceImpl, MemStores) {
        let stores = MemStores::new();
        let svc = DiagServiceImpl::new(
            stores.assessments.clone(),
            stores.snapshots.clone(),
            stores.classrooms.clone(),
            stores.audit.clone(),
        );
        (svc, stores)
    }

    fn consultant() -> ActorContext {
        ActorContext {
            actor_id: Some("consultant-1".into()),
            ..ActorContext::anonymous()
        }
    }

    fn axis(key: &str, score: u8) -> AxisResponse {
        AxisResponse {
            axis_key: key.into(),
            positive: BlockResponse {
                checklist: vec!["item".into()],
                narrative: Some("what works".into()),
                score: Some(score),
                consultant_score: None,
            },
            negative: BlockResponse {
                score: Some(score),
                ..BlockResponse::default()
            },
            solution: BlockResponse {
                score: Some(score),
                ..BlockResponse::default()
            },
        }
    }

    fn save_request(subject: &str) -> SaveRequest {
        SaveRequest {
            assessment_id: None,
            subject_id: Some(subject.into()),
            respondent_name: Some("Maria".into()),
            respondent_email: Some("maria@example.org".into()),
            respondent_phone: None,
            consent: true,
            assessment_date: None,
            status: None,
            axes: vec![axis("governance_planning", 5)],
            key_questions: None,
            base_version_number: Some(0),
            classroom_code: None,
            classroom_token: None,
            classroom_session_id: None,
        }
    }

    async fn open_room(svc: &DiagServiceImpl, subject: &str) -> CreateSessionResponse {
        svc.create_session(
            &consultant(),
            CreateSessionRequest {
                subject_id: subject.into(),
                expires_at: None,
                with_token: true,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn one_active_session_per_subject() {
        let (svc, _) = service();
        open_room(&svc, "2600054").await;
        let err = svc
            .create_session(
                &consultant(),
                CreateSessionRequest {
                    subject_id: "2600054".into(),
                    expires_at: None,
                    with_token: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::StatusBlocked(_)));
    }

    #[tokio::test]
    async fn session_creation_requires_identity() {
        let (svc, _) = service();
        let err = svc
            .create_session(
                &ActorContext::anonymous(),
                CreateSessionRequest {
                    subject_id: "2600054".into(),
                    expires_at: None,
                    with_token: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Forbidden(_)));
    }

    #[tokio::test]
    async fn session_overview_reports_counts() {
        let (svc, _) = service();
        let room = open_room(&svc, "2600054").await;
        for name in ["Maria", "Joana"] {
            svc.resolve_join(
                &ActorContext::anonymous(),
                JoinRequest {
                    session_id: Some(room.session_id),
                    name: Some(name.into()),
                    ..JoinRequest::default()
                },
            )
            .await
            .unwrap();
        }
        let mut req = save_request("2600054");
        req.classroom_code = Some(room.code.clone());
        req.classroom_token = room.token.clone();
        svc.save(&ActorContext::anonymous(), req).await.unwrap();

        let overview = svc.session_overview(room.session_id).await.unwrap();
        assert_eq!(overview.code, room.code);
        assert_eq!(overview.status, SessionStatus::Active);
        assert_eq!(overview.participant_count, 2);
        assert_eq!(overview.assessment_count, 1);

        let err = svc.session_overview(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DiagError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_is_idempotent_on_email() {
        let (svc, stores) = service();
        let room = open_room(&svc, "2600054").await;
        let req = JoinRequest {
            session_id: None,
            code: Some(room.code.to_lowercase()),
            token: room.token.clone(),
            name: Some("Maria".into()),
            email: Some(" Maria@Example.ORG ".into()),
            role_label: None,
            organization: None,
        };
        let first = svc
            .resolve_join(&ActorContext::anonymous(), req.clone())
            .await
            .unwrap();
        let second = svc
            .resolve_join(&ActorContext::anonymous(), req)
            .await
            .unwrap();
        assert_eq!(first.participant_id, second.participant_id);
        let actions = stores.audit.actions().await;
        assert_eq!(
            actions.iter().filter(|a| *a == "JOIN_SUCCESS").count(),
            2
        );
    }

    #[tokio::test]
    async fn join_without_email_always_creates_participant() {
        let (svc, _) = service();
        let room = open_room(&svc, "2600054").await;
        let req = JoinRequest {
            session_id: Some(room.session_id),
            code: None,
            token: None,
            name: None,
            email: None,
            role_label: None,
            organization: None,
        };
        let first = svc
            .resolve_join(&ActorContext::anonymous(), req.clone())
            .await
            .unwrap();
        let second = svc
            .resolve_join(&ActorContext::anonymous(), req)
            .await
            .unwrap();
        assert_ne!(first.participant_id, second.participant_id);
    }

    #[tokio::test]
    async fn join_rejects_bad_token_and_audits() {
        let (svc, stores) = service();
        let room = open_room(&svc, "2600054").await;
        let err = svc
            .resolve_join(
                &ActorContext::anonymous(),
                JoinRequest {
                    session_id: None,
                    code: Some(room.code.clone()),
                    token: Some("ffffffffffffffffffffffff".into()),
                    name: None,
                    email: None,
                    role_label: None,
                    organization: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::InvalidToken));
        assert!(stores.audit.actions().await.contains(&"JOIN_FAILED".into()));
    }

    #[tokio::test]
    async fn join_unknown_code_is_not_found() {
        let (svc, _) = service();
        let err = svc
            .resolve_join(
                &ActorContext::anonymous(),
                JoinRequest {
                    session_id: None,
                    code: Some("ZZZZ99".into()),
                    token: None,
                    name: None,
                    email: None,
                    role_label: None,
                    organization: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_closed_room_is_blocked() {
        let (svc, _) = service();
        let room = open_room(&svc, "2600054").await;
        svc.set_session_status(&consultant(), room.session_id, SessionStatus::Closed)
            .await
            .unwrap();
        let err = svc
            .resolve_join(
                &ActorContext::anonymous(),
                JoinRequest {
                    session_id: Some(room.session_id),
                    code: None,
                    token: None,
                    name: None,
                    email: None,
                    role_label: None,
                    organization: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::StatusBlocked(_)));
    }

    #[tokio::test]
    async fn save_creates_then_updates_without_conflict() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        assert_eq!(created.current_version_number, 0);
        assert!(!created.conflict_detected);

        let mut again = save_request("2600054");
        again.assessment_id = Some(created.id);
        again.base_version_number = Some(0);
        let updated = svc.save(&actor, again).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert!(!updated.conflict_detected);
    }

    #[tokio::test]
    async fn stale_base_version_sets_conflict_flag_but_write_lands() {
        let (svc, stores) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();

        // Another writer snapshots in between.
        let record = stores.assessments.get(created.id).await.unwrap();
        stores
            .snapshots
            .create(
                record.id,
                Role::Consultant,
                None,
                SnapshotPayload::capture(&record),
            )
            .await
            .unwrap();

        let mut stale = save_request("2600054");
        stale.assessment_id = Some(created.id);
        stale.base_version_number = Some(0);
        stale.axes = vec![axis("governance_planning", 8)];
        let outcome = svc.save(&actor, stale).await.unwrap();
        assert!(outcome.conflict_detected);
        let stored = stores.assessments.get(created.id).await.unwrap();
        assert_eq!(
            stored.axis("governance_planning").unwrap().positive.score,
            Some(8)
        );
    }

    #[tokio::test]
    async fn save_rejects_unknown_axis_and_out_of_range_score() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let mut bad_axis = save_request("2600054");
        bad_axis.axes = vec![axis("made_up_axis", 5)];
        assert!(matches!(
            svc.save(&actor, bad_axis).await.unwrap_err(),
            DiagError::ValidationFailed(_)
        ));
        let mut bad_score = save_request("2600054");
        bad_score.axes = vec![axis("governance_planning", 11)];
        assert!(matches!(
            svc.save(&actor, bad_score).await.unwrap_err(),
            DiagError::ValidationFailed(_)
        ));
    }

    #[tokio::test]
    async fn submit_snapshots_and_locks_respondent_fields() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();

        let outcome = svc
            .submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome.status, AssessmentStatus::Submitted);
        assert_eq!(outcome.versions.len(), 1);
        assert_eq!(outcome.versions[0].label, "T0");
        assert_eq!(outcome.versions[0].version_number, 1);

        let mut after = save_request("2600054");
        after.assessment_id = Some(created.id);
        assert!(matches!(
            svc.save(&actor, after).await.unwrap_err(),
            DiagError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn submit_requires_consent() {
        let (svc, stores) = service();
        let actor = ActorContext::anonymous();
        let mut req = save_request("2600054");
        req.consent = false;
        let created = svc.save(&actor, req).await.unwrap();
        assert!(matches!(
            svc.submit(&actor, created.id, SubmitRequest::default())
                .await
                .unwrap_err(),
            DiagError::ValidationFailed(_)
        ));
        // A rejected submit must not freeze a version.
        assert_eq!(stores.snapshots.count(created.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn classroom_flow_save_and_submit() {
        let (svc, _) = service();
        let room = open_room(&svc, "2600054").await;
        let actor = ActorContext::anonymous();

        let mut req = save_request("");
        req.subject_id = None;
        req.classroom_code = Some(room.code.clone());
        req.classroom_token = room.token.clone();
        let saved = svc.save(&actor, req).await.unwrap();

        // Subject inherited from the room.
        let record = svc.get_assessment(saved.id).await.unwrap();
        assert_eq!(record.subject_id, "2600054");
        assert_eq!(record.classroom_session_id, Some(room.session_id));

        let outcome = svc
            .submit(
                &actor,
                saved.id,
                SubmitRequest {
                    classroom_code: Some(room.code.clone()),
                    classroom_token: room.token.clone(),
                    classroom_session_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, AssessmentStatus::Submitted);
    }

    #[tokio::test]
    async fn classroom_save_requires_the_full_pair() {
        let (svc, _) = service();
        let room = open_room(&svc, "2600054").await;
        let mut req = save_request("2600054");
        req.classroom_code = Some(room.code);
        assert!(matches!(
            svc.save(&ActorContext::anonymous(), req).await.unwrap_err(),
            DiagError::ClassroomCredentialMissing(_)
        ));
    }

    #[tokio::test]
    async fn classroom_submit_rejects_foreign_assessment() {
        let (svc, _) = service();
        let room_a = open_room(&svc, "2600054").await;
        let room_b = open_room(&svc, "3106200").await;
        let actor = ActorContext::anonymous();

        let mut req = save_request("");
        req.subject_id = None;
        req.classroom_code = Some(room_a.code.clone());
        req.classroom_token = room_a.token.clone();
        let saved = svc.save(&actor, req).await.unwrap();

        let err = svc
            .submit(
                &actor,
                saved.id,
                SubmitRequest {
                    classroom_code: Some(room_b.code),
                    classroom_token: room_b.token,
                    classroom_session_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Forbidden(_)));
    }

    #[tokio::test]
    async fn consultant_save_moves_to_review_and_snapshots() {
        let (svc, stores) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        svc.submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();

        let outcome = svc
            .consultant_save(
                &consultant(),
                created.id,
                ConsultantSaveRequest {
                    analyses: None,
                    scores: vec![ConsultantScores {
                        axis_key: "governance_planning".into(),
                        positive: Some(7),
                        negative: None,
                        solution: None,
                    }],
                    key_question_commentary: None,
                    status: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, AssessmentStatus::InReview);
        assert_eq!(outcome.current_version_number, 2);

        let record = stores.assessments.get(created.id).await.unwrap();
        let axis = record.axis("governance_planning").unwrap();
        assert_eq!(axis.positive.consultant_score, Some(7));
        // The respondent's own score is untouched.
        assert_eq!(axis.positive.score, Some(5));
    }

    #[tokio::test]
    async fn returned_assessment_reopens_for_respondent() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        svc.submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();
        svc.consultant_save(
            &consultant(),
            created.id,
            ConsultantSaveRequest {
                analyses: None,
                scores: vec![],
                key_question_commentary: None,
                status: Some(AssessmentStatus::Returned),
            },
        )
        .await
        .unwrap();

        let mut again = save_request("2600054");
        again.assessment_id = Some(created.id);
        again.axes = vec![axis("governance_planning", 9)];
        let outcome = svc.save(&actor, again).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn respondent_save_preserves_consultant_overrides() {
        let (svc, stores) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        svc.submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();
        svc.consultant_save(
            &consultant(),
            created.id,
            ConsultantSaveRequest {
                analyses: None,
                scores: vec![ConsultantScores {
                    axis_key: "governance_planning".into(),
                    positive: Some(7),
                    negative: None,
                    solution: None,
                }],
                key_question_commentary: None,
                status: Some(AssessmentStatus::Returned),
            },
        )
        .await
        .unwrap();

        let mut again = save_request("2600054");
        again.assessment_id = Some(created.id);
        again.axes = vec![axis("governance_planning", 9)];
        svc.save(&actor, again).await.unwrap();

        let record = stores.assessments.get(created.id).await.unwrap();
        let axis = record.axis("governance_planning").unwrap();
        assert_eq!(axis.positive.score, Some(9));
        assert_eq!(axis.positive.consultant_score, Some(7));
    }

    #[tokio::test]
    async fn milestone_labels_default_and_deny_non_consultants() {
        let (svc, stores) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        svc.submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();

        let err = svc
            .register_milestone(
                &actor,
                Role::Respondent,
                created.id,
                MilestoneRequest { label: None },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiagError::Forbidden(_)));
        assert!(stores
            .audit
            .actions()
            .await
            .contains(&"MILESTONE_DENIED".into()));

        let second = svc
            .register_milestone(
                &consultant(),
                Role::Consultant,
                created.id,
                MilestoneRequest { label: None },
            )
            .await
            .unwrap();
        assert_eq!(second.version_number, 2);
        assert_eq!(second.label, "T1");

        let named = svc
            .register_milestone(
                &consultant(),
                Role::Consultant,
                created.id,
                MilestoneRequest {
                    label: Some("After training".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(named.label, "After training");
    }

    #[tokio::test]
    async fn compare_rejects_snapshots_of_different_assessments() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let a = svc.save(&actor, save_request("2600054")).await.unwrap();
        let b = svc.save(&actor, save_request("3106200")).await.unwrap();
        svc.submit(&actor, a.id, SubmitRequest::default())
            .await
            .unwrap();
        svc.submit(&actor, b.id, SubmitRequest::default())
            .await
            .unwrap();
        let va = svc.list_versions(a.id).await.unwrap();
        let vb = svc.list_versions(b.id).await.unwrap();
        assert!(matches!(
            svc.compare_versions(a.id, va[0].id, vb[0].id)
                .await
                .unwrap_err(),
            DiagError::ValidationFailed(_)
        ));
    }

    #[tokio::test]
    async fn compare_reports_consultant_override_delta() {
        let (svc, _) = service();
        let actor = ActorContext::anonymous();
        let created = svc.save(&actor, save_request("2600054")).await.unwrap();
        svc.submit(&actor, created.id, SubmitRequest::default())
            .await
            .unwrap();
        svc.consultant_save(
            &consultant(),
            created.id,
            ConsultantSaveRequest {
                analyses: None,
                scores: vec![ConsultantScores {
                    axis_key: "governance_planning".into(),
                    positive: Some(8),
                    negative: Some(8),
                    solution: Some(8),
                }],
                key_question_commentary: None,
                status: None,
            },
        )
        .await
        .unwrap();

        let versions = svc.list_versions(created.id).await.unwrap();
        let report = svc
            .compare_versions(created.id, versions[0].id, versions[1].id)
            .await
            .unwrap();
        let axis = &report.axes[0];
        assert_eq!(axis.score_a, 5.0);
        assert_eq!(axis.score_b, 8.0);
        assert_eq!(axis.delta, 3.0);
    }

    #[tokio::test]
    async fn versions_for_unknown_assessment_is_not_found() {
        let (svc, _) = service();
        assert!(matches!(
            svc.list_versions(Uuid::new_v4()).await.unwrap_err(),
            DiagError::NotFound(_)
        ));
    }
}
