//! Runtime host for the agent.
//!
//! Serves the managed-runtime surface: `POST /invocations` for one-shot
//! prompts (buffered JSON or SSE), `GET /ping` for health, and `GET /ws` for
//! prompt-per-frame WebSocket sessions. All routes share one
//! [`RuntimeState`] holding the process-wide agent.

pub mod invocation;
pub mod server;
pub mod session;
pub mod state;
pub mod websocket;

pub use server::{build_router, start_runtime};
pub use state::RuntimeState;
