//! The assessment status state machine.
//!
//! All status changes route through [`check_transition`]; saves carrying a
//! status are validated here before the store is touched. `Finalized` is
//! terminal for normal flow — reopening is an out-of-band administrative
//! action, not a transition.

use crate::error::DiagError;
use crate::model::Assessment;
use crate::types::{AssessmentStatus, Role};

/// Allowed transitions as (from, to, acting role) triples.
const TRANSITIONS: &[(AssessmentStatus, AssessmentStatus, Role)] = {
    use AssessmentStatus::*;
    use Role::*;
    &[
        (Draft, Submitted, Respondent),
        (Returned, Submitted, Respondent),
        (Submitted, InReview, Consultant),
        (Submitted, Returned, Consultant),
        (InReview, Returned, Consultant),
        (Submitted, Finalized, Consultant),
        (InReview, Finalized, Consultant),
        (Returned, Finalized, Consultant),
    ]
};

/// Whether `role` may move an assessment from `from` to `to`.
pub fn is_allowed(from: AssessmentStatus, to: AssessmentStatus, role: Role) -> bool {
    TRANSITIONS.iter().any(|&(f, t, r)| f == from && t == to && r == role)
}

/// All statuses `role` may move out of `from`.
pub fn allowed_targets(from: AssessmentStatus, role: Role) -> Vec<AssessmentStatus> {
    TRANSITIONS
        .iter()
        .filter(|&&(f, _, r)| f == from && r == role)
        .map(|&(_, t, _)| t)
        .collect()
}

/// Validate a requested transition, including the submit guard.
///
/// A no-op (`from == to`) is accepted so saves can idempotently carry the
/// current status.
pub fn check_transition(
    assessment: &Assessment,
    to: AssessmentStatus,
    role: Role,
) -> Result<(), DiagError> {
    let from = assessment.status;
    if from == to {
        return Ok(());
    }
    if !is_allowed(from, to, role) {
        return Err(DiagError::StatusBlocked(format!(
            "{role} cannot move assessment from {from} to {to}"
        )));
    }
    if to == AssessmentStatus::Submitted {
        check_submit_requirements(assessment)?;
    }
    Ok(())
}

/// Submit prerequisites: consent, a bound subject, a respondent name.
pub fn check_submit_requirements(assessment: &Assessment) -> Result<(), DiagError> {
    if !assessment.consent {
        return Err(DiagError::ValidationFailed(
            "consent is required before submitting".into(),
        ));
    }
    if assessment.subject_id.trim().is_empty() {
        return Err(DiagError::ValidationFailed(
            "a municipality must be bound before submitting".into(),
        ));
    }
    if assessment
        .respondent_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .is_empty()
    {
        return Err(DiagError::ValidationFailed(
            "respondent name is required before submitting".into(),
        ));
    }
    Ok(())
}
