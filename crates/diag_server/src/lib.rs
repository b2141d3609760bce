//! diag_server — REST surface for the diagnostics lifecycle service.

pub mod actor;
pub mod error;
pub mod handlers;
pub mod router;
