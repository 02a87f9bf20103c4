//! Channel adapter trait and shared adapter state

use super::message::{InboundMessage, OutboundMessage};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::RwLock;

/// Events emitted by a channel adapter
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A chat message arrived
    Message(InboundMessage),
    /// The adapter connected to its platform
    Connected { channel: String },
    /// The adapter lost (or closed) its connection
    Disconnected { channel: String, reason: String },
    /// A recoverable adapter error
    Error { channel: String, error: String },
}

/// A chat platform the bridge can talk through
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel name (e.g. "telegram")
    fn name(&self) -> &str;

    /// Start receiving; inbound events are sent to `event_tx`
    async fn start(&self, event_tx: tokio::sync::mpsc::Sender<ChannelEvent>) -> Result<()>;

    /// Stop receiving
    async fn stop(&self) -> Result<()>;

    /// Send a reply, returning the platform message id
    async fn send_message(&self, message: OutboundMessage) -> Result<String>;

    /// Show a "typing" indicator in a chat
    async fn send_typing(&self, chat_id: &str) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Adapter lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Name and status bookkeeping shared by adapters
#[derive(Debug)]
pub struct AdapterBase {
    name: String,
    status: RwLock<AdapterStatus>,
}

impl AdapterBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RwLock::new(AdapterStatus::Stopped),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AdapterStatus {
        *self
            .status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status(&self, status: AdapterStatus) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    pub fn is_running(&self) -> bool {
        self.status() == AdapterStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_base_status() {
        let base = AdapterBase::new("telegram");
        assert_eq!(base.name(), "telegram");
        assert_eq!(base.status(), AdapterStatus::Stopped);
        assert!(!base.is_running());

        base.set_status(AdapterStatus::Running);
        assert!(base.is_running());
    }
}
