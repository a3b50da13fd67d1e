//! Wizard field schema and validators.
//!
//! The canonical field order is fixed; both the in-chat wizard, the
//! external-terminal wizard and the direct-mode argument validation walk
//! the same table, so a value is checked by exactly one rule no matter
//! which path supplied it.
//!
//! Conditional fields (`docker_*`, `sync_ftp_*`) only become required
//! once their gate field is set to true.

use std::collections::BTreeMap;

use crate::config::model::{
    self, default_port, ConnectionType, DockerConfig, ServerConfig, ShellKind, SyncConfig,
};

/// Wizard-layer bounds on the server name (tighter than the registry rule).
const NAME_MIN: usize = 3;
const NAME_MAX: usize = 20;

/// When a field must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Always prompted.
    Required,
    /// Settable by name, never prompted.
    Optional,
    /// Prompted only while the named gate field is true.
    RequiredIf(&'static str),
}

/// Validation rule applied to a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Server name: registry charset, 3-20 chars.
    Name,
    /// Hostname or IP, no whitespace.
    Host,
    /// Login user name.
    Username,
    /// TCP port, 1..=65535.
    Port,
    /// `ssh` or `relay`.
    ConnectionType,
    /// Boolean vocabulary: true/false, yes/no, 1/0.
    Bool,
    /// Non-empty free text.
    Text,
}

/// One field of the wizard schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name as used in tool arguments.
    pub name: &'static str,
    /// Prompt shown to the user.
    pub prompt: &'static str,
    /// Default accepted on an empty reply, if any.
    pub default: Option<&'static str>,
    /// Validation rule.
    pub kind: FieldKind,
    /// When the field must be answered.
    pub requirement: Requirement,
    /// Whether the value is masked when rendered back.
    pub secret: bool,
}

/// Canonical field order.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        prompt: "Server name (3-20 chars, letters/digits/_/-)",
        default: None,
        kind: FieldKind::Name,
        requirement: Requirement::Required,
        secret: false,
    },
    FieldSpec {
        name: "host",
        prompt: "Host name or IP address",
        default: None,
        kind: FieldKind::Host,
        requirement: Requirement::Required,
        secret: false,
    },
    FieldSpec {
        name: "username",
        prompt: "Login username",
        default: None,
        kind: FieldKind::Username,
        requirement: Requirement::Required,
        secret: false,
    },
    FieldSpec {
        name: "port",
        prompt: "SSH port",
        default: Some("22"),
        kind: FieldKind::Port,
        requirement: Requirement::Required,
        secret: false,
    },
    FieldSpec {
        name: "connection_type",
        prompt: "Connection type (ssh or relay)",
        default: Some("ssh"),
        kind: FieldKind::ConnectionType,
        requirement: Requirement::Required,
        secret: false,
    },
    FieldSpec {
        name: "docker_enabled",
        prompt: "Use a Docker container? (yes/no)",
        default: Some("false"),
        kind: FieldKind::Bool,
        requirement: Requirement::Optional,
        secret: false,
    },
    FieldSpec {
        name: "docker_container",
        prompt: "Container name",
        default: None,
        kind: FieldKind::Text,
        requirement: Requirement::RequiredIf("docker_enabled"),
        secret: false,
    },
    FieldSpec {
        name: "docker_image",
        prompt: "Image used if the container must be created",
        default: Some("ubuntu:22.04"),
        kind: FieldKind::Text,
        requirement: Requirement::RequiredIf("docker_enabled"),
        secret: false,
    },
    FieldSpec {
        name: "sync_enabled",
        prompt: "Enable file auto-sync? (yes/no)",
        default: Some("false"),
        kind: FieldKind::Bool,
        requirement: Requirement::Optional,
        secret: false,
    },
    FieldSpec {
        name: "sync_ftp_port",
        prompt: "Sync FTP port",
        default: Some("8021"),
        kind: FieldKind::Port,
        requirement: Requirement::RequiredIf("sync_enabled"),
        secret: false,
    },
    FieldSpec {
        name: "sync_ftp_user",
        prompt: "Sync FTP username",
        default: Some("sync"),
        kind: FieldKind::Username,
        requirement: Requirement::RequiredIf("sync_enabled"),
        secret: false,
    },
    FieldSpec {
        name: "sync_ftp_password",
        prompt: "Sync FTP password",
        default: None,
        kind: FieldKind::Text,
        requirement: Requirement::RequiredIf("sync_enabled"),
        secret: true,
    },
];

/// Looks up a field by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Validates one value against its field's rule.
///
/// # Errors
///
/// Returns a message stating the violated rule with an example; the
/// message always contains the word "validation".
pub fn validate(spec: &FieldSpec, value: &str) -> Result<(), String> {
    let fail = |rule: &str, example: &str| {
        Err(format!(
            "validation failed for '{}': {rule} (example: {example})",
            spec.name
        ))
    };

    match spec.kind {
        FieldKind::Name => {
            if !model::is_valid_name(value) || value.len() < NAME_MIN || value.len() > NAME_MAX {
                return fail(
                    "must be 3-20 chars, start with a letter or digit, and use only letters, digits, _ and -",
                    "gpu-box-01",
                );
            }
        }
        FieldKind::Host => {
            if !model::is_valid_host(value) {
                return fail("must be non-empty without whitespace", "10.12.0.7");
            }
        }
        FieldKind::Username => {
            if !model::is_valid_username(value) {
                return fail("must use only letters, digits, _ and -", "deploy_user");
            }
        }
        FieldKind::Port => {
            let port: Option<u16> = value.parse().ok().filter(|p| *p > 0);
            if port.is_none() {
                return fail("must be an integer in 1..65535", "22");
            }
        }
        FieldKind::ConnectionType => {
            if ConnectionType::parse(value).is_none() {
                return fail("must be one of ssh, relay", "ssh");
            }
        }
        FieldKind::Bool => {
            if model::parse_bool(value).is_none() {
                return fail("must be one of true/false, yes/no, 1/0", "yes");
            }
        }
        FieldKind::Text => {
            if value.is_empty() {
                return fail("must not be empty", "dev_container");
            }
        }
    }
    Ok(())
}

/// Whether a gate field holds true in the answers (session answers win
/// over seeded defaults).
#[must_use]
pub fn gate_is_open(
    gate: &str,
    answers: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> bool {
    answers
        .get(gate)
        .or_else(|| defaults.get(gate))
        .and_then(|v| model::parse_bool(v))
        .unwrap_or(false)
}

/// Fields currently required, in canonical order.
#[must_use]
pub fn required_fields(
    answers: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> Vec<&'static FieldSpec> {
    FIELDS
        .iter()
        .filter(|f| match f.requirement {
            Requirement::Required => true,
            Requirement::Optional => false,
            Requirement::RequiredIf(gate) => gate_is_open(gate, answers, defaults),
        })
        .collect()
}

/// First required field without an answer, or `None` when the wizard is
/// complete.
#[must_use]
pub fn next_field(
    answers: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> Option<&'static FieldSpec> {
    required_fields(answers, defaults)
        .into_iter()
        .find(|f| !answers.contains_key(f.name))
}

/// Builds the final server record from validated answers.
///
/// `base` carries the existing record in update mode; answered fields
/// overwrite it, everything else is preserved.
///
/// # Errors
///
/// Returns a message when the combined record fails registry validation.
pub fn materialize(
    answers: &BTreeMap<String, String>,
    base: Option<&ServerConfig>,
) -> Result<ServerConfig, String> {
    let get = |name: &str| answers.get(name).map(String::as_str);

    let mut server = base.cloned().unwrap_or_else(|| ServerConfig::new("", "", ""));
    if let Some(name) = get("name") {
        server.name = name.to_string();
    }
    if let Some(host) = get("host") {
        server.host = host.to_string();
    }
    if let Some(username) = get("username") {
        server.username = username.to_string();
    }
    if let Some(port) = get("port") {
        server.port = port.parse().unwrap_or_else(|_| default_port());
    }
    if let Some(kind) = get("connection_type") {
        server.connection_type = ConnectionType::parse(kind).unwrap_or_default();
    }

    let docker_on = get("docker_enabled").and_then(model::parse_bool).unwrap_or(false);
    if docker_on {
        let existing = server.docker.take();
        let container_name = get("docker_container")
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|d| d.container_name.clone()))
            .unwrap_or_default();
        let image = get("docker_image")
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|d| d.image.clone()))
            .unwrap_or_else(|| "ubuntu:22.04".to_string());
        let mut docker = existing.unwrap_or(DockerConfig {
            container_name: String::new(),
            image: String::new(),
            auto_create: false,
            ports: Vec::new(),
            volumes: Vec::new(),
            shell: ShellKind::Bash,
            run_options: None,
        });
        docker.container_name = container_name;
        docker.image = image;
        server.docker = Some(docker);
    } else if get("docker_enabled").is_some() {
        // The gate was explicitly answered false
        server.docker = None;
    }

    let sync_on = get("sync_enabled").and_then(model::parse_bool).unwrap_or(false);
    if sync_on {
        let existing = server.sync.take();
        let mut sync = existing.unwrap_or(SyncConfig {
            enabled: true,
            remote_workspace: "/workspace".to_string(),
            local_workspace: ".".to_string(),
            ftp_port: 8021,
            ftp_user: "sync".to_string(),
            ftp_password: String::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        });
        sync.enabled = true;
        if let Some(port) = get("sync_ftp_port") {
            sync.ftp_port = port.parse().unwrap_or(sync.ftp_port);
        }
        if let Some(user) = get("sync_ftp_user") {
            sync.ftp_user = user.to_string();
        }
        if let Some(password) = get("sync_ftp_password") {
            sync.ftp_password = password.to_string();
        }
        server.sync = Some(sync);
    } else if get("sync_enabled").is_some() {
        server.sync = None;
    }

    server.validate().map_err(|e| e.to_string())?;
    Ok(server)
}
