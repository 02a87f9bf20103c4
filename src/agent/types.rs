//! Agent API and process types

use crate::error::Result;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;

/// Chunked response body of a message submission
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A session as reported by `GET /api/session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl SessionDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title if the agent reported a non-empty one, else the id
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.id,
        }
    }
}

/// Agent process lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentProcessState {
    /// No process (never started, stopped, or spawn failed)
    Down,
    /// Spawned, not yet seen healthy
    Starting,
    /// Spawned and answered a health probe
    Up,
    /// Terminated on its own
    Exited,
}

impl fmt::Display for AgentProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentProcessState::Down => "down",
            AgentProcessState::Starting => "starting",
            AgentProcessState::Up => "up",
            AgentProcessState::Exited => "exited",
        };
        f.write_str(s)
    }
}

/// Snapshot of the agent process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProcessInfo {
    /// OS process id
    pub pid: Option<u32>,
    /// Working directory the process was started in
    pub working_dir: PathBuf,
    /// Lifecycle state
    pub state: AgentProcessState,
    /// Exit code, once the process has terminated on its own
    pub exit_code: Option<i32>,
    /// Spawn time (ms since UNIX epoch)
    pub started_at: i64,
}
