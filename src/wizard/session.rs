//! In-process wizard sessions.
//!
//! A [`ConfigSession`] is the state of one multi-step configuration
//! flow: the answers collected so far and the per-session defaults
//! (update mode seeds defaults from the existing record). Sessions live
//! only inside the [`WizardRegistry`] map and die with the process;
//! nothing here touches the disk. Completion hands a finished
//! [`ServerConfig`] back to the caller, which persists it.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::model::REDACTED;
use crate::config::ServerConfig;
use crate::wizard::fields::{self, FieldSpec};

/// One live wizard session.
#[derive(Debug)]
pub struct ConfigSession {
    /// Session id, `config_<unix-millis>`.
    pub id: String,

    /// Validated answers, by field name.
    answers: BTreeMap<String, String>,

    /// Per-session defaults (seeded from the base record in update mode).
    defaults: BTreeMap<String, String>,

    /// Existing record being updated, if any.
    base: Option<ServerConfig>,
}

impl ConfigSession {
    /// Number of answered fields.
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    /// The next required, unanswered field.
    #[must_use]
    pub fn next(&self) -> Option<&'static FieldSpec> {
        fields::next_field(&self.answers, &self.defaults)
    }

    /// The default shown for a field: session default first, then the
    /// schema default.
    fn default_for(&self, spec: &FieldSpec) -> Option<String> {
        self.defaults
            .get(spec.name)
            .cloned()
            .or_else(|| spec.default.map(str::to_string))
    }

    /// Renders the step prompt per the wizard contract: step header,
    /// current prompt with default, answered fields (secrets masked),
    /// and the instruction line naming the follow-up tool.
    #[must_use]
    pub fn render_prompt(&self) -> String {
        let required = fields::required_fields(&self.answers, &self.defaults);
        let total = required.len();
        let step = required
            .iter()
            .filter(|f| self.answers.contains_key(f.name))
            .count()
            + 1;

        let Some(current) = self.next() else {
            return "Configuration complete.".to_string();
        };

        let mut out = vec![format!("Server configuration - step {step}/{total}")];
        out.push(String::new());
        match self.default_for(current) {
            Some(default) => out.push(format!("{} [default: {default}]:", current.prompt)),
            None => out.push(format!("{}:", current.prompt)),
        }

        if !self.answers.is_empty() {
            out.push(String::new());
            out.push("Completed so far:".to_string());
            for (i, (name, value)) in self.answers.iter().enumerate() {
                let shown = if fields::find(name).is_some_and(|f| f.secret) {
                    REDACTED
                } else {
                    value.as_str()
                };
                out.push(format!("  {}. {name} = {shown}", i + 1));
            }
        }

        out.push(String::new());
        out.push(format!(
            "Reply by calling continue_config_session with {{session_id: \"{}\", field_name: \"{}\", field_value: \"...\"}}",
            self.id, current.name
        ));
        out.join("\n")
    }
}

/// What one `continue_config_session` call produced.
#[derive(Debug)]
pub enum StepOutcome {
    /// More fields to go; carries the next rendered prompt.
    Prompt(String),
    /// All required fields answered; the session has been destroyed.
    Complete(ServerConfig),
}

/// The process-wide table of live wizard sessions.
#[derive(Debug, Default)]
pub struct WizardRegistry {
    sessions: HashMap<String, ConfigSession>,
}

impl WizardRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session. `base` is the existing record in update mode;
    /// its scalar fields become the session defaults so an empty reply
    /// keeps the current value.
    pub fn begin(&mut self, base: Option<ServerConfig>) -> &ConfigSession {
        let mut defaults = BTreeMap::new();
        if let Some(record) = &base {
            defaults.insert("name".to_string(), record.name.clone());
            defaults.insert("host".to_string(), record.host.clone());
            defaults.insert("username".to_string(), record.username.clone());
            defaults.insert("port".to_string(), record.port.to_string());
            defaults.insert(
                "connection_type".to_string(),
                record.connection_type.as_str().to_string(),
            );
            if let Some(docker) = &record.docker {
                defaults.insert("docker_enabled".to_string(), "true".to_string());
                defaults.insert("docker_container".to_string(), docker.container_name.clone());
                defaults.insert("docker_image".to_string(), docker.image.clone());
            }
            if let Some(sync) = &record.sync {
                defaults.insert("sync_enabled".to_string(), sync.enabled.to_string());
                defaults.insert("sync_ftp_port".to_string(), sync.ftp_port.to_string());
                defaults.insert("sync_ftp_user".to_string(), sync.ftp_user.clone());
            }
        }

        let id = self.fresh_id();
        debug!(session = %id, update = base.is_some(), "wizard session started");
        let session = ConfigSession {
            id: id.clone(),
            answers: BTreeMap::new(),
            defaults,
            base,
        };
        self.sessions.entry(id).or_insert(session)
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConfigSession> {
        self.sessions.get(id)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies one field answer to a session.
    ///
    /// An empty value accepts the field's default when one exists. On
    /// success the session either advances (returning the next prompt)
    /// or completes (returning the finished record; the session is
    /// destroyed). On validation failure the session is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a message for an unknown session, an unknown field, or a
    /// value that fails its validator. The message contains the word
    /// "validation" in the validator case.
    pub fn advance(
        &mut self,
        session_id: &str,
        field_name: &str,
        field_value: &str,
    ) -> Result<StepOutcome, String> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("no active configuration session with id '{session_id}'"))?;

        let Some(spec) = fields::find(field_name) else {
            return Err(format!(
                "unknown field '{field_name}'; expected one of: {}",
                fields::FIELDS
                    .iter()
                    .map(|f| f.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        };

        // Empty reply takes the default when there is one
        let value = if field_value.is_empty() {
            let Some(default) = session
                .defaults
                .get(spec.name)
                .cloned()
                .or_else(|| spec.default.map(str::to_string))
            else {
                return Err(format!(
                    "validation failed for '{}': a value is required (this field has no default)",
                    spec.name
                ));
            };
            default
        } else {
            field_value.to_string()
        };

        fields::validate(spec, &value)?;
        session.answers.insert(spec.name.to_string(), value);

        if session.next().is_some() {
            return Ok(StepOutcome::Prompt(session.render_prompt()));
        }

        // Complete: materialize first so a combined-validation failure
        // leaves the session alive, then destroy it
        let server = fields::materialize(&session.answers, session.base.as_ref())?;
        debug!(session = %session.id, server = %server.name, "wizard session completed");
        self.sessions.remove(session_id);
        Ok(StepOutcome::Complete(server))
    }

    /// Allocates a `config_<unix-millis>` id, bumping on collision.
    fn fresh_id(&self) -> String {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        loop {
            let id = format!("config_{millis}");
            if !self.sessions.contains_key(&id) {
                return id;
            }
            millis += 1;
        }
    }
}
