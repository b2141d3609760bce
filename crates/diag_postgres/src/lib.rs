//! Postgres adapters for the diag_core port traits.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time DB requirement. Schema lives in `schema.sql`.

pub mod store;

pub use store::{PgAssessmentStore, PgAuditLog, PgClassroomStore, PgSnapshotStore, PgStores};
