//! Core type definitions for AgentGate.
//!
//! Broken down into submodules, one per governance concern.

pub mod approval;
pub mod budget;
pub mod invocation;
pub mod policy;
pub mod principal;
pub mod rate_limit;
pub mod trigger;

// Re-export everything so callers can use `agentgate_core::types::*`.
pub use approval::*;
pub use budget::*;
pub use invocation::*;
pub use policy::*;
pub use principal::*;
pub use rate_limit::*;
pub use trigger::*;
