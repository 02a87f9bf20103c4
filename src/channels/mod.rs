//! Chat channel adapters
//!
//! Provides a unified interface for receiving and sending messages on a
//! chat platform. Telegram is the only platform wired up.

mod adapter;
mod message;
mod telegram;

pub use adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
pub use message::{split_message, InboundMessage, OutboundMessage};
pub use telegram::{TelegramAdapter, TelegramSettings, MAX_MESSAGE_CHARS};
