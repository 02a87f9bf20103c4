//! Frostty configuration management
//!
//! Configuration comes from an optional TOML file, overridden by command-line
//! flags or their environment variables. Everything is loaded once at startup
//! and [`FrosttyConfig::resolve`] turns it into a [`ResolvedConfig`], failing
//! with [`Error::Config`] when a required setting is missing.
//!
//! ```toml
//! [telegram]
//! bot_token = "123456:ABC..."
//! allowed_users = [123456789]
//!
//! [agent]
//! executable = "/usr/local/bin/opencode"
//! port = 4096
//! workspace = "~/code/project"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main Frostty configuration (as read from disk)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrosttyConfig {
    /// Telegram channel configuration
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Agent process configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Allowed user IDs (empty = everyone)
    #[serde(default)]
    pub allowed_users: Vec<i64>,

    /// Long-poll timeout for `getUpdates`, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: Vec::new(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

/// Agent process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Path to the agent executable
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Port the agent's HTTP API listens on
    #[serde(default)]
    pub port: Option<u16>,

    /// Default workspace the agent starts in
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Start the agent when the bridge starts
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            executable: None,
            port: None,
            workspace: None,
            autostart: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Values supplied on the command line (or their environment variables).
/// Any value present here wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub executable: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Validated configuration, every required setting present
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bot_token: String,
    pub allowed_users: Vec<i64>,
    pub poll_timeout_secs: u64,
    pub executable: PathBuf,
    pub port: u16,
    pub workspace: PathBuf,
    pub autostart: bool,
}

impl FrosttyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply command-line/environment overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.bot_token {
            self.telegram.bot_token = Some(token);
        }
        if let Some(executable) = overrides.executable {
            self.agent.executable = Some(executable);
        }
        if let Some(workspace) = overrides.workspace {
            self.agent.workspace = Some(workspace);
        }
        if let Some(port) = overrides.port {
            self.agent.port = Some(port);
        }
    }

    /// Check that every required setting is present
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let bot_token = self
            .telegram
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| missing("telegram.bot_token", "FROSTTY_BOT_TOKEN"))?;
        let executable = self
            .agent
            .executable
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(expand_tilde)
            .ok_or_else(|| missing("agent.executable", "FROSTTY_AGENT_BIN"))?;
        let port = self
            .agent
            .port
            .filter(|p| *p != 0)
            .ok_or_else(|| missing("agent.port", "FROSTTY_AGENT_PORT"))?;
        let workspace = self
            .agent
            .workspace
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(expand_tilde)
            .ok_or_else(|| missing("agent.workspace", "FROSTTY_WORKSPACE"))?;

        Ok(ResolvedConfig {
            bot_token,
            allowed_users: self.telegram.allowed_users.clone(),
            poll_timeout_secs: self.telegram.poll_timeout_secs,
            executable,
            port,
            workspace,
            autostart: self.agent.autostart,
        })
    }

    /// Copy of this configuration safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.telegram.bot_token.is_some() {
            config.telegram.bot_token = Some("<redacted>".to_string());
        }
        config
    }
}

fn missing(key: &str, env: &str) -> Error {
    Error::Config(format!("{} is not set (config file or {})", key, env))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [telegram]
        bot_token = "123:abc"
        allowed_users = [42]

        [agent]
        executable = "/usr/bin/opencode"
        port = 4096
        workspace = "/srv/code"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = FrosttyConfig::from_toml(FULL).unwrap();
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.bot_token, "123:abc");
        assert_eq!(resolved.allowed_users, vec![42]);
        assert_eq!(resolved.poll_timeout_secs, 30);
        assert_eq!(resolved.executable, PathBuf::from("/usr/bin/opencode"));
        assert_eq!(resolved.port, 4096);
        assert_eq!(resolved.workspace, PathBuf::from("/srv/code"));
        assert!(resolved.autostart);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = FrosttyConfig::from_toml(
            r#"
            [agent]
            executable = "opencode"
            port = 4096
            workspace = "/srv"
            "#,
        )
        .unwrap();

        let err = config.resolve().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("telegram.bot_token"));
    }

    #[test]
    fn test_empty_config_reports_first_missing() {
        let err = FrosttyConfig::default().resolve().unwrap_err();
        assert!(err.to_string().contains("bot_token"));
    }

    #[test]
    fn test_missing_port() {
        let mut config = FrosttyConfig::from_toml(FULL).unwrap();
        config.agent.port = None;
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("agent.port"));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = FrosttyConfig::from_toml(FULL).unwrap();
        config.apply_overrides(ConfigOverrides {
            bot_token: Some("999:zzz".to_string()),
            port: Some(5000),
            ..Default::default()
        });

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.bot_token, "999:zzz");
        assert_eq!(resolved.port, 5000);
        assert_eq!(resolved.workspace, PathBuf::from("/srv/code"));
    }

    #[test]
    fn test_overrides_alone_are_enough() {
        let mut config = FrosttyConfig::default();
        config.apply_overrides(ConfigOverrides {
            bot_token: Some("t".to_string()),
            executable: Some(PathBuf::from("opencode")),
            workspace: Some(PathBuf::from("/tmp")),
            port: Some(4096),
        });
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        let err = FrosttyConfig::from_toml("[agent\nport = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_redacted_hides_token() {
        let config = FrosttyConfig::from_toml(FULL).unwrap().redacted();
        assert_eq!(config.telegram.bot_token.as_deref(), Some("<redacted>"));
        let printed = toml::to_string_pretty(&config).unwrap();
        assert!(!printed.contains("123:abc"));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs_next::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/code")), home.join("code"));
        }
    }
}
