#![deny(unused)]
//! Backing-store implementations for AgentGate.
//!
//! This crate provides:
//! - In-memory stores (DashMap) for tests and single-process embedding
//! - A Redis-backed store for shared counters across gate instances

pub mod memory;
pub mod redis;

pub use memory::{InMemoryApprovalStore, InMemoryBudgetStore, InMemoryRateCounterStore};
pub use redis::{RedisBudgetStore, RedisCounterStore};
