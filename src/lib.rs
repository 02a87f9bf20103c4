//! Frostty - chat bridge for a locally running coding agent
//!
//! Frostty relays chat messages to a coding agent that serves an HTTP API on
//! localhost, and relays the agent's streamed replies back to the chat. The
//! chat side controls the agent through commands: start or restart it, pick
//! the workspace it runs in, and create or switch sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ChannelEvent   ┌──────────────────┐   HTTP    ┌───────────────┐
//! │ Telegram │ ──────────────► │ BridgeController │ ────────► │ agent (serve) │
//! │ adapter  │ ◄────────────── │                  │ ◄──────── │ localhost:N   │
//! └──────────┘  replies        └──────────────────┘  NDJSON   └───────────────┘
//!                                │        │                          ▲
//!                     SessionRouter   AgentLauncher ── spawn/kill ───┘
//! ```
//!
//! ## Modules
//!
//! - [`bridge`]: command dispatch and per-bridge state
//! - [`agent`]: agent HTTP client and process lifecycle
//! - [`session`]: active-session tracking
//! - [`stream`]: NDJSON framing and reply interpretation
//! - [`channels`]: chat platform adapters
//! - [`config`]: configuration management

pub mod agent;
pub mod bridge;
pub mod channels;
pub mod config;
pub mod error;
pub mod session;
pub mod stream;

pub use config::{FrosttyConfig, ResolvedConfig};
pub use error::{Error, Result};
