//! Registry data model.
//!
//! These structures map directly to the YAML configuration file format.
//! One [`ServerConfig`] per registered server, keyed by its unique name
//! inside [`Registry::servers`]. Optional sections (`docker`, `sync`,
//! `bos`) are omitted from the file when absent.
//!
//! Validation lives next to the types so that every write path (direct
//! tool arguments, wizard completion, merge updates) funnels through the
//! same rules.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder server written on first run.
///
/// Its name is reserved: the store recognises it as non-user data, so a
/// registry containing only this entry is still "empty" from the user's
/// point of view.
pub const EXAMPLE_SERVER_NAME: &str = "example-server";

/// Mask used wherever a secret is rendered.
pub const REDACTED: &str = "********";

/// The root YAML document.
///
/// `BTreeMap` keeps on-disk key order deterministic across rewrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Mapping of server name to its configuration.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,

    /// Free-form global settings, preserved verbatim across writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_settings: Option<serde_yaml::Value>,
}

impl Registry {
    /// Returns true when the registry holds no user-created servers.
    ///
    /// The first-run `example-server` placeholder does not count.
    #[must_use]
    pub fn has_user_servers(&self) -> bool {
        self.servers.keys().any(|k| k != EXAMPLE_SERVER_NAME)
    }
}

/// How the target host is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Direct SSH to the target.
    Ssh,
    /// Interactive relay gateway, optionally followed by a jump host.
    Relay,
}

impl ConnectionType {
    /// Parses a user-supplied value, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ssh" => Some(Self::Ssh),
            "relay" => Some(Self::Relay),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Relay => "relay",
        }
    }
}

impl Default for ConnectionType {
    fn default() -> Self {
        Self::Ssh
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shell preference inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// Plain bash, no extra setup.
    Bash,
    /// zsh with copied rc files.
    Zsh,
}

impl Default for ShellKind {
    fn default() -> Self {
        Self::Bash
    }
}

/// Intermediate SSH hop between the relay and the final target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpHost {
    /// Jump host address.
    pub host: String,

    /// Login user on the jump host.
    pub username: String,

    /// SSH port on the jump host.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Password sent once after the jump-host ssh command, if key auth
    /// is unavailable. Never logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Container section of a server record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Name of the container to enter.
    pub container_name: String,

    /// Image used when the container has to be created.
    pub image: String,

    /// Whether a missing container may be created with `docker run`.
    #[serde(default)]
    pub auto_create: bool,

    /// Port mappings passed to `docker run` (`-p` values).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    /// Volume mappings passed to `docker run` (`-v` values).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Preferred shell inside the container.
    #[serde(default)]
    pub shell: ShellKind,

    /// Extra raw options appended to `docker run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_options: Option<String>,
}

/// File synchronisation section of a server record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether auto-sync deployment runs after connect.
    #[serde(default)]
    pub enabled: bool,

    /// Workspace root inside the container.
    pub remote_workspace: String,

    /// Workspace root on the local machine.
    pub local_workspace: String,

    /// Port the in-container FTP server listens on.
    pub ftp_port: u16,

    /// FTP account name.
    pub ftp_user: String,

    /// FTP account password. Never logged.
    pub ftp_password: String,

    /// Glob patterns to include (passed through to the client config).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,

    /// Glob patterns to exclude (passed through to the client config).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
}

/// Object-storage credentials, opaque to the core; handed to scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BosConfig {
    /// Access key id.
    pub access_key: String,

    /// Secret key. Never logged.
    pub secret_key: String,

    /// Bucket path.
    pub bucket: String,

    /// Path of the tool config file inside the container.
    pub config_path: String,
}

/// Derived pane-session parameters for a server.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    /// Multiplexer session name, always `<server>_session`.
    pub name: String,

    /// Initial working directory for the session, if configured.
    pub working_directory: Option<String>,

    /// Shell launched in the session, if configured.
    pub shell: Option<String>,
}

/// One registered server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique name, also the registry key.
    pub name: String,

    /// Hostname or IP of the target.
    pub host: String,

    /// Login user on the target.
    pub username: String,

    /// SSH port on the target.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How the target is reached.
    #[serde(default)]
    pub connection_type: ConnectionType,

    /// Intermediate hop, present only for relay connections that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_host: Option<JumpHost>,

    /// Target password when key auth is unavailable. Never logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Free-text description shown in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Container section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,

    /// Auto-sync section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,

    /// Object-storage section, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bos: Option<BosConfig>,

    /// Initial working directory for the pane session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl ServerConfig {
    /// Creates a minimal record with defaults for everything optional.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            username: username.into(),
            port: default_port(),
            connection_type: ConnectionType::default(),
            jump_host: None,
            password: None,
            description: None,
            docker: None,
            sync: None,
            bos: None,
            working_directory: None,
        }
    }

    /// Derived pane-session parameters.
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            name: session_name(&self.name),
            working_directory: self.working_directory.clone(),
            shell: None,
        }
    }

    /// Validates the record against the registry rules.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::ValidationError`] naming the first field
    /// that violates its rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_name(&self.name) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "name '{}' must be 1-64 chars of [A-Za-z0-9][A-Za-z0-9_-]*",
                    self.name
                ),
            });
        }
        if !is_valid_host(&self.host) {
            return Err(ConfigError::ValidationError {
                message: format!("host '{}' must be non-empty without whitespace", self.host),
            });
        }
        if !is_valid_username(&self.username) {
            return Err(ConfigError::ValidationError {
                message: format!("username '{}' must match [A-Za-z0-9_-]+", self.username),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "port must lie in 1..65535".to_string(),
            });
        }
        if let Some(jump) = &self.jump_host {
            if self.connection_type != ConnectionType::Relay {
                return Err(ConfigError::ValidationError {
                    message: "jump_host is only valid for relay connections".to_string(),
                });
            }
            if !is_valid_host(&jump.host) {
                return Err(ConfigError::ValidationError {
                    message: "jump_host.host must be non-empty without whitespace".to_string(),
                });
            }
        }
        if let Some(docker) = &self.docker {
            if docker.container_name.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "docker.container_name must not be empty".to_string(),
                });
            }
        }
        if let Some(sync) = &self.sync {
            if sync.enabled && sync.remote_workspace.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "sync.remote_workspace must not be empty when sync is enabled"
                        .to_string(),
                });
            }
        }
        Ok(())
    }

    /// Renders the record as JSON with every secret masked.
    ///
    /// This is the only form in which a record leaves the process.
    #[must_use]
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut clone = self.clone();
        if clone.password.is_some() {
            clone.password = Some(REDACTED.to_string());
        }
        if let Some(jump) = clone.jump_host.as_mut() {
            if jump.password.is_some() {
                jump.password = Some(REDACTED.to_string());
            }
        }
        if let Some(sync) = clone.sync.as_mut() {
            sync.ftp_password = REDACTED.to_string();
        }
        if let Some(bos) = clone.bos.as_mut() {
            bos.secret_key = REDACTED.to_string();
        }
        serde_json::to_value(&clone).unwrap_or(serde_json::Value::Null)
    }

    /// One-line summary for `list_servers`.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description.clone().unwrap_or_default(),
            "type": self.connection_type.as_str(),
            "host": self.host,
            "username": self.username,
        })
    }
}

// Custom Debug that never reveals secrets
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("connection_type", &self.connection_type)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("docker", &self.docker.as_ref().map(|d| &d.container_name))
            .field("sync", &self.sync.as_ref().map(|s| s.enabled))
            .finish_non_exhaustive()
    }
}

/// Multiplexer session name for a server: `<server>_session`.
#[must_use]
pub fn session_name(server_name: &str) -> String {
    format!("{server_name}_session")
}

/// Default SSH port.
#[must_use]
pub const fn default_port() -> u16 {
    22
}

/// Name rule: `[A-Za-z0-9][A-Za-z0-9_-]*`, 1-64 chars.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_alphanumeric() {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Host rule: non-empty, no whitespace.
#[must_use]
pub fn is_valid_host(host: &str) -> bool {
    !host.is_empty() && !host.chars().any(char::is_whitespace)
}

/// Username rule: `[A-Za-z0-9_-]+`.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parses the boolean vocabulary accepted by tool arguments and the
/// wizard: true/false, yes/no, 1/0, case-insensitively.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// The placeholder record written on first run.
#[must_use]
pub fn example_server() -> ServerConfig {
    let mut server = ServerConfig::new(EXAMPLE_SERVER_NAME, "192.168.1.100", "your-username");
    server.description = Some(
        "Example entry created on first run. Replace it with create_server_config.".to_string(),
    );
    server
}
