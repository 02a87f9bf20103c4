//! Channel-neutral message types

use serde::{Deserialize, Serialize};

/// A message received from a chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Bridge-local id, used to correlate log lines
    pub id: String,
    /// Channel name
    pub channel: String,
    /// Sender's platform user id
    pub sender_id: String,
    /// Chat the message was sent in
    pub chat_id: String,
    /// Message text
    pub content: String,
    /// Platform message id (for replies)
    pub channel_message_id: String,
    /// Receive time (ms since UNIX epoch)
    pub timestamp: i64,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            channel_message_id: String::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_channel_message_id(mut self, id: impl Into<String>) -> Self {
        self.channel_message_id = id.into();
        self
    }
}

/// A reply to send to a chat platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    /// Platform message id to reply to
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
        }
    }

    /// Reply to `message_id`; empty ids are ignored
    pub fn reply_to(mut self, message_id: &str) -> Self {
        if !message_id.is_empty() {
            self.reply_to = Some(message_id.to_string());
        }
        self
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking at
/// the last newline inside each window when there is one.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the first `max_chars` characters
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = match window.rfind('\n') {
            Some(i) if i > 0 => i,
            _ => window_end,
        };
        parts.push(rest[..cut].to_string());
        rest = rest[cut..].strip_prefix('\n').unwrap_or(&rest[cut..]);
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_new() {
        let msg = InboundMessage::new("telegram", "42", "100", "hello");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.sender_id, "42");
        assert_eq!(msg.chat_id, "100");
        assert_eq!(msg.content, "hello");
        assert!(!msg.id.is_empty());
        assert!(msg.channel_message_id.is_empty());
    }

    #[test]
    fn test_outbound_reply_to() {
        let msg = OutboundMessage::new("telegram", "100", "hi").reply_to("7");
        assert_eq!(msg.reply_to.as_deref(), Some("7"));

        let msg = OutboundMessage::new("telegram", "100", "hi").reply_to("");
        assert_eq!(msg.reply_to, None);
    }

    #[test]
    fn test_split_short_message_untouched() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let parts = split_message("aaaa\nbbbb\ncc", 6);
        assert_eq!(parts, vec!["aaaa", "bbbb", "cc"]);
    }

    #[test]
    fn test_split_hard_break_without_newline() {
        let parts = split_message("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let parts = split_message("ééééé", 2);
        assert_eq!(parts, vec!["éé", "éé", "é"]);
    }
}
