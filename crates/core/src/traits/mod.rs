//! Collaborator traits for AgentGate.
//!
//! Traits are organized by concern:
//! - `store`: backing-store seams (budget rows, rate counters, approvals)
//! - `collaborators`: external services the gate consults (invocation
//!   history, approver authorization, notification dispatch)

pub mod collaborators;
pub mod store;

pub use collaborators::*;
pub use store::*;
