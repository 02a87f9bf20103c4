//! Bridge controller
//!
//! Turns inbound chat messages into agent operations and chat replies.
//! Every operation that talks to the agent is gated on a health probe; when
//! the agent does not answer, the only reply is [`SLEEPING_MESSAGE`].
//!
//! One agent turn runs at a time per controller. A message that arrives while
//! a reply is still streaming is answered with [`BUSY_MESSAGE`] instead of
//! being queued.

use super::command::{Command, HELP_TEXT};
use super::state::BridgeState;
use crate::agent::{AgentApi, AgentLauncher};
use crate::channels::{ChannelAdapter, InboundMessage, OutboundMessage};
use crate::config::expand_tilde;
use crate::error::{Error, Result};
use crate::session::SessionRouter;
use crate::stream::{records, EventInterpreter, Status, StreamEvent};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Reply when the agent does not answer its health probe
pub const SLEEPING_MESSAGE: &str = "Frostty is sleeping. Reply 'wake' to start.";

/// Reply to a plain message when no session is selected
pub const NO_SESSION_MESSAGE: &str =
    "No active session. Send /new to create one or /switch <id> to pick one.";

/// Reply to a plain message while another one is being answered
pub const BUSY_MESSAGE: &str = "Still working on the previous message. Try again when it is done.";

/// Orchestrates launcher, session router and reply stream for one chat bridge
pub struct BridgeController {
    launcher: Arc<AgentLauncher>,
    api: Arc<dyn AgentApi>,
    router: SessionRouter,
    state: RwLock<BridgeState>,
    /// Held for the duration of one agent turn
    turn: Mutex<()>,
}

impl BridgeController {
    /// Create a controller whose agent runs in `working_dir`
    pub fn new(
        launcher: Arc<AgentLauncher>,
        api: Arc<dyn AgentApi>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            router: SessionRouter::new(api.clone()),
            api,
            state: RwLock::new(BridgeState::new(working_dir)),
            turn: Mutex::new(()),
        }
    }

    pub fn launcher(&self) -> &Arc<AgentLauncher> {
        &self.launcher
    }

    pub async fn working_dir(&self) -> PathBuf {
        self.state.read().await.working_dir.clone()
    }

    pub async fn latest_status(&self) -> Status {
        self.state.read().await.latest_status.clone()
    }

    pub async fn active_session(&self) -> Option<String> {
        self.router.active_session().await
    }

    async fn set_status(&self, status: Status) {
        self.state.write().await.latest_status = status;
    }

    /// Probe the agent and record the result on the launcher
    async fn probe(&self) -> bool {
        let reachable = self.launcher.probe().await;
        self.launcher.observe(reachable);
        reachable
    }

    /// Handle one inbound chat message and send the reply back on `channel`.
    ///
    /// Failures are turned into chat replies; a reply that cannot be
    /// delivered is logged.
    pub async fn handle(&self, message: &InboundMessage, channel: &dyn ChannelAdapter) {
        tracing::debug!(
            message_id = %message.id,
            sender = %message.sender_id,
            chat_id = %message.chat_id,
            "Handling chat message"
        );

        let reply = self.respond(message, channel).await;

        let outbound = OutboundMessage::new(&message.channel, &message.chat_id, reply)
            .reply_to(&message.channel_message_id);
        if let Err(e) = channel.send_message(outbound).await {
            tracing::error!(
                message_id = %message.id,
                chat_id = %message.chat_id,
                "Failed to send reply: {}",
                e
            );
        }
    }

    /// Compute the reply to one inbound chat message.
    pub async fn respond(&self, message: &InboundMessage, channel: &dyn ChannelAdapter) -> String {
        let command = Command::parse(&message.content);

        if command.requires_agent() && !self.probe().await {
            tracing::info!(command = ?command, "Agent unreachable");
            return SLEEPING_MESSAGE.to_string();
        }

        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::Status => self.status_report().await,
            Command::Wake => {
                if let Err(e) = channel.send_typing(&message.chat_id).await {
                    tracing::debug!("Typing indicator failed: {}", e);
                }
                self.wake().await
            }
            Command::NewSession => self.new_session().await,
            Command::ListSessions => self.list_sessions().await,
            Command::Switch(None) => "Usage: /switch <session id>".to_string(),
            Command::Switch(Some(id)) => self.switch_session(&id).await,
            Command::Workspace(None) => {
                format!("Workspace: {}", self.working_dir().await.display())
            }
            Command::Workspace(Some(path)) => match self.set_workspace(&path).await {
                Ok(dir) => format!(
                    "Workspace set to {}. Send /new to start a session there.",
                    dir.display()
                ),
                Err(e) => format!("{}\nUsage: /workspace <existing directory>", e),
            },
            Command::Unknown(name) => format!("Unknown command /{}.\n\n{}", name, HELP_TEXT),
            Command::Message(text) => self.send_to_agent(&text, &message.chat_id, channel).await,
        }
    }

    /// Restart the agent in the current workspace and wait until it answers.
    pub async fn wake(&self) -> String {
        let dir = self.working_dir().await;
        self.set_status(Status::Waking).await;
        let result = self.launcher.wake(&dir).await;
        self.set_status(Status::Idle).await;

        match result {
            Ok(()) => format!("Frostty is awake in {}.", dir.display()),
            Err(e) => format!("Failed to wake the agent: {}", e),
        }
    }

    /// Switch the agent to another directory. Any selected session is
    /// dropped since sessions belong to the workspace they were created in.
    pub async fn set_workspace(&self, path: &str) -> Result<PathBuf> {
        let current = self.working_dir().await;
        let requested = resolve_workspace(&current, path);

        let dir = match tokio::fs::canonicalize(&requested).await {
            Ok(dir) => dir,
            Err(_) => {
                return Err(Error::Workspace(format!(
                    "{} does not exist",
                    requested.display()
                )))
            }
        };
        if !tokio::fs::metadata(&dir).await?.is_dir() {
            return Err(Error::Workspace(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        // Spawn failures are reported by the next probe
        if let Err(e) = self.launcher.start(&dir).await {
            tracing::warn!(cwd = %dir.display(), "Agent restart failed: {}", e);
        }
        self.router.clear_session().await;
        self.state.write().await.working_dir = dir.clone();

        tracing::info!(cwd = %dir.display(), "Workspace changed");
        Ok(dir)
    }

    async fn status_report(&self) -> String {
        let reachable = self.probe().await;
        let state = self.state.read().await.clone();
        let session = self.router.active_session().await;

        format!(
            "Agent: {}, {} (port {})\nWorkspace: {}\nSession: {}\nStatus: {}",
            self.launcher.state(),
            if reachable { "answering" } else { "not answering" },
            self.launcher.port(),
            state.working_dir.display(),
            session.as_deref().unwrap_or("none"),
            state.latest_status
        )
    }

    async fn new_session(&self) -> String {
        match self.router.create_session().await {
            Ok(session) => format!("Created session {}.", session.id),
            Err(e) => format!("Failed to create session: {}", e),
        }
    }

    async fn list_sessions(&self) -> String {
        let sessions = match self.router.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => return format!("Failed to list sessions: {}", e),
        };
        if sessions.is_empty() {
            return "No sessions yet. Send /new to create one.".to_string();
        }

        let active = self.router.active_session().await;
        let mut lines = vec!["Sessions:".to_string()];
        for session in &sessions {
            let marker = if active.as_deref() == Some(session.id.as_str()) {
                "▶"
            } else {
                "•"
            };
            if session.label() == session.id {
                lines.push(format!("{} {}", marker, session.id));
            } else {
                lines.push(format!("{} {} ({})", marker, session.id, session.label()));
            }
        }
        lines.join("\n")
    }

    async fn switch_session(&self, id: &str) -> String {
        match self.router.select_session(id).await {
            Ok(session) => format!("Switched to session {}.", session.label()),
            Err(Error::SessionNotFound(id)) => format!(
                "Session {} not found. Send /sessions to see available sessions.",
                id
            ),
            Err(e) => format!("Failed to switch session: {}", e),
        }
    }

    /// Submit `text` to the active session and fold the streamed reply.
    async fn send_to_agent(&self, text: &str, chat_id: &str, channel: &dyn ChannelAdapter) -> String {
        let Some(session_id) = self.router.active_session().await else {
            return NO_SESSION_MESSAGE.to_string();
        };

        let Ok(_turn) = self.turn.try_lock() else {
            tracing::info!(session_id = %session_id, "Turn in progress, rejecting message");
            return BUSY_MESSAGE.to_string();
        };

        if let Err(e) = channel.send_typing(chat_id).await {
            tracing::debug!("Typing indicator failed: {}", e);
        }

        self.set_status(Status::Thinking).await;
        let reply = self.stream_reply(&session_id, text).await;
        self.set_status(Status::Idle).await;

        match reply {
            Ok(reply) => reply,
            Err((partial, e)) if partial.trim().is_empty() => {
                format!("Agent request failed: {}", e)
            }
            Err((partial, e)) => format!("{}\n\nAgent request failed: {}", partial.trim_end(), e),
        }
    }

    /// Run one agent turn. On failure returns the text received so far
    /// together with the error.
    async fn stream_reply(
        &self,
        session_id: &str,
        text: &str,
    ) -> std::result::Result<String, (String, Error)> {
        let body = self
            .api
            .send_message(session_id, text)
            .await
            .map_err(|e| (String::new(), e))?;

        let mut interpreter = EventInterpreter::new();
        let records = records(body);
        futures::pin_mut!(records);

        while let Some(record) = records.next().await {
            let record = match record {
                Ok(record) => record,
                Err(e) => return Err((interpreter.partial_reply().to_string(), e)),
            };
            if let Some(StreamEvent::ToolUse { tool }) = interpreter.apply(&record) {
                tracing::debug!(session_id, tool = %tool, "Agent running tool");
                self.set_status(interpreter.status().clone()).await;
            }
        }

        Ok(interpreter.finish())
    }
}

/// Resolve a user-supplied workspace path: `~` expands to the home
/// directory, relative paths are taken from the current workspace.
fn resolve_workspace(current: &Path, input: &str) -> PathBuf {
    let path = expand_tilde(Path::new(input.trim()));
    if path.is_relative() {
        current.join(path)
    } else {
        path
    }
}
