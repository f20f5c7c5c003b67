//! Core types, event model, errors, and configuration for agent-relay.

pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod types;
