#![deny(unused)]
//! Core types, traits, and error definitions for AgentGate.
//!
//! This crate provides the foundational building blocks shared across the
//! governance evaluators and the backing-store implementations.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
