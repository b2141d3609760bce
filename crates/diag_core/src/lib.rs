//! diag_core — domain core for the municipal maturity diagnostics system.
//!
//! Pure logic crate: assessment lifecycle (status state machine + field
//! editability), immutable version snapshots with longitudinal comparison,
//! optimistic-concurrency save semantics, and the anonymous classroom-session
//! join protocol. Storage is abstracted behind port traits implemented by
//! `diag_postgres` (or the in-memory stores in [`memory`] for tests and
//! DB-less runs).

pub mod autosave;
pub mod axes;
pub mod classroom;
pub mod compare;
pub mod editability;
pub mod error;
pub mod memory;
pub mod model;
pub mod ports;
pub mod proto;
pub mod service;
pub mod types;
pub mod workflow;

pub use error::DiagError;
pub use service::{DiagService, DiagServiceImpl};
