//! Agent process management and HTTP client for the coding agent
//!
//! ## Architecture
//!
//! ```text
//! BridgeController ──► AgentLauncher ──► ProcessSpawner (`<agent> serve --port N`)
//!        │                  │
//!        │                  └── probe ──┐
//!        └──────── SessionRouter ───────┴──► AgentApi (HTTP, localhost:N)
//! ```

pub mod client;
pub mod launcher;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{AgentApi, HttpAgentClient, PROBE_TIMEOUT};
pub use launcher::{
    AgentLauncher, CommandSpawner, ProcessSpawner, WAKE_MAX_ATTEMPTS, WAKE_POLL_INTERVAL,
};
pub use types::{AgentProcessInfo, AgentProcessState, ByteStream, SessionDescriptor};
