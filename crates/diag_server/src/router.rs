//! Router construction for the diagnostics server.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use diag_core::DiagService;

use crate::handlers;

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: Arc<dyn DiagService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/classrooms", post(handlers::classrooms::create))
        .route("/classrooms/:id", get(handlers::classrooms::overview))
        .route("/classrooms/close/:id", post(handlers::classrooms::close))
        .route("/classrooms/join", post(handlers::classrooms::join))
        .route("/assessments", post(handlers::assessments::save))
        .route("/assessments/:id", get(handlers::assessments::get))
        .route(
            "/assessments/:id/submit",
            post(handlers::assessments::submit),
        )
        .route(
            "/assessments/:id/consultant",
            patch(handlers::assessments::consultant_save),
        )
        .route(
            "/assessments/:id/milestone",
            post(handlers::assessments::milestone),
        )
        .route("/assessments/:id/versions", get(handlers::versions::list))
        .route("/assessments/:id/compare", get(handlers::versions::compare))
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
