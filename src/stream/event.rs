//! Wire events carried by the agent's message stream
//!
//! Each record is a JSON object tagged by `type`. Two variants are
//! recognized; their payload can arrive under either of two field names, and
//! the first non-empty one wins:
//!
//! | `type`     | precedence          | fallback  |
//! |------------|---------------------|-----------|
//! | `tool_use` | `tool`, then `name` | `"tool"`  |
//! | `text`     | `content`, then `text` | `""`   |
//!
//! This schema is what the bridge has been built against; it has not been
//! confirmed against every agent release.

use serde::Deserialize;

/// Tool name used when a `tool_use` record names none
pub const UNKNOWN_TOOL: &str = "tool";

/// A decoded stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The agent started running a tool
    ToolUse { tool: String },
    /// A fragment of the reply text
    Text { content: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    ToolUse {
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Text {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl StreamEvent {
    /// Decode one record. Returns `None` for anything that is not a
    /// recognized event: invalid JSON, non-objects, unknown types, or fields
    /// of the wrong shape.
    pub fn parse(record: &str) -> Option<Self> {
        let record = record.trim();
        if record.is_empty() {
            return None;
        }

        match serde_json::from_str::<WireEvent>(record) {
            Ok(WireEvent::ToolUse { tool, name }) => Some(StreamEvent::ToolUse {
                tool: first_non_empty(tool, name).unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
            }),
            Ok(WireEvent::Text { content, text }) => Some(StreamEvent::Text {
                content: first_non_empty(content, text).unwrap_or_default(),
            }),
            Ok(WireEvent::Other) => None,
            Err(e) => {
                tracing::trace!("Dropping undecodable stream record: {}", e);
                None
            }
        }
    }
}

fn first_non_empty(primary: Option<String>, secondary: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or_else(|| secondary.filter(|s| !s.is_empty()))
}
