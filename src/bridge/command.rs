//! Chat command parsing

/// A chat message classified as a bridge command or free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/help`
    Help,
    /// `/status`
    Status,
    /// `/wake`, or a bare `wake`
    Wake,
    /// `/new`
    NewSession,
    /// `/sessions`
    ListSessions,
    /// `/switch <id>`; `None` when the id is missing
    Switch(Option<String>),
    /// `/workspace [path]`; `None` shows the current workspace
    Workspace(Option<String>),
    /// Any other `/command`
    Unknown(String),
    /// Free text for the agent
    Message(String),
}

impl Command {
    /// Classify one inbound chat message.
    ///
    /// Command names are case-insensitive and may carry an `@botname`
    /// suffix, as Telegram adds in group chats.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        if trimmed.eq_ignore_ascii_case("wake") {
            return Command::Wake;
        }

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Message(text.to_string());
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("");
        let name = name.split('@').next().unwrap_or("").to_ascii_lowercase();
        let args = parts
            .next()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        match name.as_str() {
            "start" | "help" => Command::Help,
            "status" => Command::Status,
            "wake" => Command::Wake,
            "new" => Command::NewSession,
            "sessions" => Command::ListSessions,
            "switch" => Command::Switch(args),
            "workspace" => Command::Workspace(args),
            _ => Command::Unknown(name),
        }
    }

    /// Whether the agent must be reachable before this command runs
    pub fn requires_agent(&self) -> bool {
        matches!(
            self,
            Command::NewSession
                | Command::ListSessions
                | Command::Switch(_)
                | Command::Message(_)
        )
    }
}

/// Usage text for `/help` and unknown commands
pub const HELP_TEXT: &str = "\
Frostty relays your messages to the coding agent.

/new - start a new session
/sessions - list sessions
/switch <id> - switch to a session
/workspace [path] - show or change the workspace
/status - show agent and session status
/wake - (re)start the agent

Anything else is sent to the active session.";
