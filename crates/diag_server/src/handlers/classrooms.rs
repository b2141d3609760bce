//! Classroom session handlers.
//!
//! POST /classrooms            — open a session (consultant)
//! GET  /classrooms/:id        — poll session status and counters
//! POST /classrooms/close/:id  — close a session (consultant)
//! POST /classrooms/join       — anonymous participant join

use std::sync::Arc;

use axum::extract::Path;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use uuid::Uuid;

use diag_core::error::DiagError;
use diag_core::proto::{CreateSessionRequest, JoinRequest};
use diag_core::types::{Role, SessionStatus};
use diag_core::DiagService;

use crate::actor::{actor_context, actor_role};
use crate::error::AppError;

fn require_consultant(headers: &HeaderMap) -> Result<(), AppError> {
    if actor_role(headers) == Some(Role::Consultant) {
        Ok(())
    } else {
        Err(DiagError::Forbidden("consultant role required".into()).into())
    }
}

pub async fn create(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_consultant(&headers)?;
    let actor = actor_context(&headers);
    let resp = service.create_session(&actor, req).await?;
    let json = serde_json::to_value(&resp).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

/// Anonymous: the waiting-room view polls this while participants trickle in.
pub async fn overview(
    Extension(service): Extension<Arc<dyn DiagService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let overview = service.session_overview(id).await?;
    let json = serde_json::to_value(&overview).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

pub async fn close(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_consultant(&headers)?;
    let actor = actor_context(&headers);
    let session = service
        .set_session_status(&actor, id, SessionStatus::Closed)
        .await?;
    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "status": session.status,
    })))
}

pub async fn join(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Json(req): Json<JoinRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = actor_context(&headers);
    let outcome = service.resolve_join(&actor, req).await?;
    let json = serde_json::to_value(&outcome).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}
