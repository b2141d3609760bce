//! Assessment lifecycle handlers.
//!
//! POST  /assessments                 — respondent save (create or update)
//! GET   /assessments/:id             — fetch the live record
//! POST  /assessments/:id/submit      — respondent submit
//! PATCH /assessments/:id/consultant  — consultant save
//! POST  /assessments/:id/milestone   — labelled snapshot (consultant)

use std::sync::Arc;

use axum::extract::Path;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use uuid::Uuid;

use diag_core::error::DiagError;
use diag_core::proto::{ConsultantSaveRequest, MilestoneRequest, SaveRequest, SubmitRequest};
use diag_core::types::Role;
use diag_core::DiagService;

use crate::actor::{actor_context, actor_role};
use crate::error::AppError;

pub async fn save(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Json(req): Json<SaveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = actor_context(&headers);
    let outcome = service.save(&actor, req).await?;
    let json = serde_json::to_value(&outcome).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

pub async fn get(
    Extension(service): Extension<Arc<dyn DiagService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = service.get_assessment(id).await?;
    let json = serde_json::to_value(&record).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

pub async fn submit(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = actor_context(&headers);
    let outcome = service.submit(&actor, id, req).await?;
    let json = serde_json::to_value(&outcome).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

pub async fn consultant_save(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ConsultantSaveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if actor_role(&headers) != Some(Role::Consultant) {
        return Err(DiagError::Forbidden("consultant role required".into()).into());
    }
    let actor = actor_context(&headers);
    let outcome = service.consultant_save(&actor, id, req).await?;
    let json = serde_json::to_value(&outcome).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}

pub async fn milestone(
    Extension(service): Extension<Arc<dyn DiagService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<MilestoneRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = actor_context(&headers);
    // Denials are audited inside the service, so the role goes through as-is.
    let role = actor_role(&headers).unwrap_or(Role::Respondent);
    let outcome = service.register_milestone(&actor, role, id, req).await?;
    let json = serde_json::to_value(&outcome).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}
