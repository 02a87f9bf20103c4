//! Folds decoded stream events into a status line and a reply

use super::event::StreamEvent;
use std::fmt;

/// Reply used when the agent finished without producing any text
pub const COMPLETION_MARKER: &str = "✅ Done.";

/// Human-readable phase of the bridge
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing in flight
    #[default]
    Idle,
    /// Restarting the agent process
    Waking,
    /// Message submitted, no tool activity yet
    Thinking,
    /// The agent is running a tool
    RunningTool(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Waking => write!(f, "Waking up..."),
            Status::Thinking => write!(f, "Thinking..."),
            Status::RunningTool(tool) => write!(f, "Running `{}`...", tool),
        }
    }
}

/// Running state of one agent reply.
#[derive(Debug)]
pub struct EventInterpreter {
    status: Status,
    reply: String,
}

impl Default for EventInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventInterpreter {
    pub fn new() -> Self {
        Self {
            status: Status::Thinking,
            reply: String::new(),
        }
    }

    /// Apply one raw record. Returns the event it decoded to, or `None` when
    /// the record was dropped and nothing changed.
    pub fn apply(&mut self, record: &str) -> Option<StreamEvent> {
        let event = StreamEvent::parse(record)?;
        match &event {
            StreamEvent::ToolUse { tool } => {
                self.status = Status::RunningTool(tool.clone());
            }
            StreamEvent::Text { content } => {
                self.reply.push_str(content);
            }
        }
        Some(event)
    }

    /// Current status line
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Text accumulated so far
    pub fn partial_reply(&self) -> &str {
        &self.reply
    }

    /// Final reply: the accumulated text, or [`COMPLETION_MARKER`] when the
    /// text is blank.
    pub fn finish(self) -> String {
        if self.reply.trim().is_empty() {
            COMPLETION_MARKER.to_string()
        } else {
            self.reply
        }
    }
}
