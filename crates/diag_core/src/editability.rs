//! Role × status field-editability table.
//!
//! One declarative table consulted before any field write, instead of
//! per-field conditionals scattered through save paths. Read-only
//! presentation is the UI's job; this check is the defense-in-depth layer
//! that turns out-of-window writes into `Forbidden`.

use crate::error::DiagError;
use crate::types::{AssessmentStatus, FieldGroup, Role};

/// Whether `role` may write `group` while the assessment is in `status`.
///
/// | Role       | Draft | Submitted | InReview | Returned | Finalized |
/// |------------|-------|-----------|----------|----------|-----------|
/// | Respondent | yes   | no        | no       | yes      | no        |
/// | Consultant | no    | yes       | yes      | yes      | no        |
pub fn can_edit(role: Role, status: AssessmentStatus, group: FieldGroup) -> bool {
    use AssessmentStatus::*;
    match (role, group) {
        (Role::Respondent, FieldGroup::RespondentFields) => matches!(status, Draft | Returned),
        (Role::Consultant, FieldGroup::ConsultantFields) => {
            matches!(status, Submitted | InReview | Returned)
        }
        // No role ever writes the other role's field group.
        _ => false,
    }
}

/// The field group a role owns on its ordinary save path.
pub fn owned_group(role: Role) -> FieldGroup {
    match role {
        Role::Respondent => FieldGroup::RespondentFields,
        Role::Consultant => FieldGroup::ConsultantFields,
    }
}

/// Enforce the table at the point of save.
pub fn ensure_editable(
    role: Role,
    status: AssessmentStatus,
    group: FieldGroup,
) -> Result<(), DiagError> {
    if can_edit(role, status, group) {
        Ok(())
    } else {
        Err(DiagError::Forbidden(format!(
            "{role} fields are not editable while the assessment is {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssessmentStatus::*;

    #[test]
    fn respondent_window_is_draft_and_returned() {
        for status in [Draft, Returned] {
            assert!(can_edit(Role::Respondent, status, FieldGroup::RespondentFields));
        }
        for status in [Submitted, InReview, Finalized] {
            assert!(!can_edit(Role::Respondent, status, FieldGroup::RespondentFields));
        }
    }

    #[test]
    fn consultant_window_is_submitted_in_review_returned() {
        for status in [Submitted, InReview, Returned] {
            assert!(can_edit(Role::Consultant, status, FieldGroup::ConsultantFields));
        }
        for status in [Draft, Finalized] {
            assert!(!can_edit(Role::Consultant, status, FieldGroup::ConsultantFields));
        }
    }

    #[test]
    fn cross_role_writes_always_blocked() {
        for status in [Draft, Submitted, InReview, Returned, Finalized] {
            assert!(!can_edit(Role::Respondent, status, FieldGroup::ConsultantFields));
            assert!(!can_edit(Role::Consultant, status, FieldGroup::RespondentFields));
        }
    }

    #[test]
    fn finalized_locks_everyone() {
        assert!(!can_edit(Role::Respondent, Finalized, FieldGroup::RespondentFields));
        assert!(!can_edit(Role::Consultant, Finalized, FieldGroup::ConsultantFields));
    }

    #[test]
    fn ensure_editable_reports_forbidden() {
        let err = ensure_editable(Role::Respondent, Submitted, FieldGroup::RespondentFields)
            .unwrap_err();
        assert!(matches!(err, DiagError::Forbidden(_)));
        assert!(err.to_string().contains("submitted"));
    }
}
