use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("status blocked: {0}")]
    StatusBlocked(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("invalid classroom token")]
    InvalidToken,

    #[error("classroom credential missing: {0}")]
    ClassroomCredentialMissing(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DiagError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Expired(_) => 410,
            Self::StatusBlocked(_) => 409,
            Self::Forbidden(_) => 403,
            Self::ValidationFailed(_) => 422,
            Self::InvalidToken => 403,
            Self::ClassroomCredentialMissing(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// Short machine-readable reason, used by the join path's audit rows.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Expired(_) => "expired",
            Self::StatusBlocked(_) => "status_blocked",
            Self::Forbidden(_) => "forbidden",
            Self::ValidationFailed(_) => "validation_failed",
            Self::InvalidToken => "invalid_token",
            Self::ClassroomCredentialMissing(_) => "credential_missing",
            Self::Internal(_) => "unexpected",
        }
    }
}
