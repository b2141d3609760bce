//! Core enums for the assessment lifecycle.
//! Pure value types — no sqlx, no DB dependencies.

// Enums use `from_str() -> Option<Self>` instead of `FromStr` because they
// return None for unknown values rather than an error.
#![allow(clippy::should_implement_trait)]

use serde::{Deserialize, Serialize};

/// Assessment lifecycle status.
///
/// Transitions are enforced by [`crate::workflow`]; no store write may move
/// an assessment between statuses directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Submitted,
    InReview,
    Returned,
    Finalized,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Returned => "returned",
            Self::Finalized => "finalized",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "in_review" => Some(Self::InReview),
            "returned" => Some(Self::Returned),
            "finalized" => Some(Self::Finalized),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Acting role for saves and transitions.
///
/// Privileged-role authentication happens upstream; this is the already
/// resolved role, not a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Respondent,
    Consultant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respondent => "respondent",
            Self::Consultant => "consultant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "respondent" => Some(Self::Respondent),
            "consultant" => Some(Self::Consultant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classroom session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Preparing,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preparing" => Some(Self::Preparing),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field groups for the editability table.
///
/// The respondent owns blocks 1–2 of every axis (checklist, narrative, own
/// score) plus identity/consent; the consultant owns block-3 analysis text,
/// consultant scores and the key-question commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    RespondentFields,
    ConsultantFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            AssessmentStatus::Draft,
            AssessmentStatus::Submitted,
            AssessmentStatus::InReview,
            AssessmentStatus::Returned,
            AssessmentStatus::Finalized,
        ] {
            assert_eq!(AssessmentStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(AssessmentStatus::from_str("bogus"), None);
    }

    #[test]
    fn session_status_round_trips() {
        for s in [
            SessionStatus::Preparing,
            SessionStatus::Active,
            SessionStatus::Closed,
        ] {
            assert_eq!(SessionStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&AssessmentStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
    }
}
