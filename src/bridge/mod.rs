//! Chat-to-agent bridge
//!
//! ```text
//! ChannelEvent::Message ──► Command::parse ──► BridgeController
//!                                                 ├── AgentLauncher (probe / wake / start)
//!                                                 ├── SessionRouter (new / list / switch)
//!                                                 └── AgentApi::send_message ──► stream
//! ```

mod command;
mod controller;
mod state;

pub use command::{Command, HELP_TEXT};
pub use controller::{BridgeController, BUSY_MESSAGE, NO_SESSION_MESSAGE, SLEEPING_MESSAGE};
pub use state::BridgeState;
