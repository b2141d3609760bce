//! Version history handlers.
//!
//! GET /assessments/:id/versions — scored summaries, oldest first
//! GET /assessments/:id/compare?from=<snapshot>&to=<snapshot>

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use diag_core::error::DiagError;
use diag_core::DiagService;

use crate::error::AppError;

pub async fn list(
    Extension(service): Extension<Arc<dyn DiagService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let versions = service.version_summaries(id).await?;
    let json = serde_json::to_value(&versions).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(serde_json::json!({ "versions": json })))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub from: Uuid,
    pub to: Uuid,
}

pub async fn compare(
    Extension(service): Extension<Arc<dyn DiagService>>,
    Path(id): Path<Uuid>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = service.compare_versions(id, query.from, query.to).await?;
    let json = serde_json::to_value(&report).map_err(|e| DiagError::Internal(e.into()))?;
    Ok(Json(json))
}
