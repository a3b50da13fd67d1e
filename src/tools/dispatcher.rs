//! Tool dispatch.
//!
//! Validates `tools/call` arguments against the catalog's contracts and
//! routes to the config store, the connection orchestrator, the wizard
//! registry or the local executor. Every failure becomes a text result:
//! schema violations name the offending argument, component errors carry
//! their diagnostic, and a panic anywhere below is caught here and
//! reported as `internal error: ...` so the process never dies
//! mid-session.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info};

use crate::config::model::{parse_bool, session_name};
use crate::config::ConfigStore;
use crate::connect::orchestrator::DEFAULT_CONNECT_TIMEOUT;
use crate::connect::{diagnose, Orchestrator};
use crate::local;
use crate::pane::{PaneManager, DEFAULT_TAIL_LINES};
use crate::tools::ToolCallResult;
use crate::wizard::{fields, StepOutcome, WizardRegistry};

/// Default timeout for `execute_command` and `run_local_command`.
const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes tool calls to the subsystems.
pub struct ToolDispatcher {
    store: ConfigStore,
    pane: Arc<dyn PaneManager>,
    orchestrator: Orchestrator,
    wizard: WizardRegistry,
}

impl ToolDispatcher {
    /// Creates a dispatcher with production orchestrator tunables.
    #[must_use]
    pub fn new(store: ConfigStore, pane: Arc<dyn PaneManager>) -> Self {
        let orchestrator = Orchestrator::new(Arc::clone(&pane));
        Self {
            store,
            pane,
            orchestrator,
            wizard: WizardRegistry::new(),
        }
    }

    /// Creates a dispatcher around an explicit orchestrator (tests use
    /// fast polling).
    #[must_use]
    pub fn with_orchestrator(
        store: ConfigStore,
        pane: Arc<dyn PaneManager>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            store,
            pane,
            orchestrator,
            wizard: WizardRegistry::new(),
        }
    }

    /// Executes one tool call.
    ///
    /// Never panics outward: anything a handler throws is converted to an
    /// `internal error` text result.
    pub fn dispatch(&mut self, name: &str, arguments: &Value) -> ToolCallResult {
        info!(tool = name, "tool call");
        let outcome = catch_unwind(AssertUnwindSafe(|| self.route(name, arguments)));
        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tool = name, detail = %detail, "tool handler panicked");
                ToolCallResult::error(format!("internal error: {detail}"))
            }
        }
    }

    fn route(&mut self, name: &str, args: &Value) -> ToolCallResult {
        match name {
            "list_servers" => self.list_servers(),
            "get_server_info" => self.get_server_info(args),
            "get_server_status" => self.get_server_status(args),
            "connect_server" => self.connect_server(args),
            "disconnect_server" => self.disconnect_server(args),
            "execute_command" => self.execute_command(args),
            "run_local_command" => Self::run_local_command(args),
            "create_server_config" => self.create_server_config(args),
            "continue_config_session" => self.continue_config_session(args),
            "update_server_config" => self.update_server_config(args),
            "delete_server_config" => self.delete_server_config(args),
            "diagnose_connection" => self.diagnose_connection(args),
            _ => ToolCallResult::error(format!("Unknown tool: {name}")),
        }
    }

    fn list_servers(&self) -> ToolCallResult {
        if let Err(e) = self.store.ensure_exists() {
            return ToolCallResult::error(e.to_string());
        }
        let registry = self.store.load();
        let summaries: Vec<Value> = registry.servers.values().map(|s| s.summary()).collect();
        match serde_json::to_string_pretty(&summaries) {
            Ok(rendered) => ToolCallResult::text(rendered),
            Err(e) => ToolCallResult::error(format!("could not render server list: {e}")),
        }
    }

    fn get_server_info(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        if let Err(e) = self.store.ensure_exists() {
            return ToolCallResult::error(e.to_string());
        }
        match self.store.get(name) {
            Some(server) => match serde_json::to_string_pretty(&server.redacted_json()) {
                Ok(rendered) => ToolCallResult::text(rendered),
                Err(e) => ToolCallResult::error(format!("could not render server info: {e}")),
            },
            None => ToolCallResult::error(format!("server '{name}' is not configured")),
        }
    }

    fn get_server_status(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        let session = session_name(name);
        let exists = match self.pane.exists(&session) {
            Ok(exists) => exists,
            Err(e) => return ToolCallResult::error(e.to_string()),
        };
        let tail = if exists {
            self.pane
                .capture(&session, DEFAULT_TAIL_LINES)
                .unwrap_or_default()
        } else {
            String::new()
        };
        let status = serde_json::json!({
            "exists": exists,
            "last_output_tail": tail,
        });
        match serde_json::to_string_pretty(&status) {
            Ok(rendered) => ToolCallResult::text(rendered),
            Err(e) => ToolCallResult::error(format!("could not render status: {e}")),
        }
    }

    fn connect_server(&mut self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        let force_recreate = match opt_bool(args, "force_recreate", true) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        let timeout = match opt_timeout(args, DEFAULT_CONNECT_TIMEOUT) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        let Some(server) = self.store.get(name) else {
            return ToolCallResult::error(format!("server '{name}' is not configured"));
        };

        match self.orchestrator.connect(&server, timeout, force_recreate) {
            Ok(outcome) => {
                let mut lines = vec![
                    if outcome.reused {
                        format!("Reusing the existing session for '{name}'.")
                    } else {
                        format!("Connected to '{name}'.")
                    },
                    format!("Session: {}", outcome.session_name),
                    format!("Prompt: {}", outcome.prompt),
                ];
                for warning in &outcome.warnings {
                    lines.push(format!("warning: {warning}"));
                }
                ToolCallResult::text(lines.join("\n"))
            }
            Err(e) => {
                let mut message = format!("Connection to '{name}' failed: {e}");
                if let Some(tail) = e.tail() {
                    message.push_str("\n\nLast session output:\n");
                    message.push_str(tail);
                }
                message.push_str("\n\nThe session was left running; use get_server_status or diagnose_connection to inspect it.");
                ToolCallResult::error(message)
            }
        }
    }

    fn disconnect_server(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        let session = session_name(name);
        match self.pane.kill(&session) {
            Ok(()) => ToolCallResult::text(format!(
                "Session '{session}' terminated (safe to repeat if it was not running)."
            )),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn execute_command(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        let command = match require_str(args, "command") {
            Ok(c) => c,
            Err(e) => return ToolCallResult::error(e),
        };
        let timeout = match opt_timeout(args, DEFAULT_EXEC_TIMEOUT) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };

        let session = session_name(name);
        match self.pane.exists(&session) {
            Ok(true) => {}
            Ok(false) => {
                return ToolCallResult::error(format!(
                    "no live session for '{name}'; run connect_server first"
                ));
            }
            Err(e) => return ToolCallResult::error(e.to_string()),
        }

        match self.orchestrator.driver().run_command(&session, command, timeout) {
            Ok(result) if result.exit_code >= 0 => ToolCallResult::text(format!(
                "exit code: {}\n\n{}",
                result.exit_code, result.output
            )),
            Ok(result) => ToolCallResult::error(format!(
                "command did not complete within {}s; the session was left running\n\nLast output:\n{}",
                timeout.as_secs(),
                result.output
            )),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn run_local_command(args: &Value) -> ToolCallResult {
        let command = match require_str(args, "command") {
            Ok(c) => c,
            Err(e) => return ToolCallResult::error(e),
        };
        let timeout = match opt_timeout(args, DEFAULT_EXEC_TIMEOUT) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };

        match local::run(command, timeout) {
            Ok(out) if out.timed_out => ToolCallResult::error(format!(
                "command timed out after {}s and was killed\n\nstdout:\n{}\nstderr:\n{}",
                timeout.as_secs(),
                out.stdout,
                out.stderr
            )),
            Ok(out) => ToolCallResult::text(format!(
                "exit code: {}\n\nstdout:\n{}\nstderr:\n{}",
                out.exit_code, out.stdout, out.stderr
            )),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn create_server_config(&mut self, args: &Value) -> ToolCallResult {
        let interactive = match opt_bool(args, "interactive", true) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        let cursor_interactive = match opt_bool(args, "cursor_interactive", true) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };

        if !interactive {
            return self.create_direct(args);
        }
        if cursor_interactive {
            let session = self.wizard.begin(None);
            return ToolCallResult::text(session.render_prompt());
        }
        match crate::wizard::terminal::spawn_external_wizard() {
            Ok(notice) => ToolCallResult::text(notice),
            Err(e) => ToolCallResult::error(e),
        }
    }

    /// Direct mode: all fields come from the arguments.
    fn create_direct(&self, args: &Value) -> ToolCallResult {
        let answers = match collect_field_answers(args) {
            Ok(a) => a,
            Err(e) => return ToolCallResult::error(e),
        };
        for required in ["name", "host", "username"] {
            if !answers.contains_key(required) {
                return ToolCallResult::error(format!(
                    "missing required argument '{required}' (required when interactive=false)"
                ));
            }
        }

        let server = match fields::materialize(&answers, None) {
            Ok(s) => s,
            Err(e) => return ToolCallResult::error(e),
        };
        let name = server.name.clone();
        let mut entries = BTreeMap::new();
        entries.insert(name.clone(), server);
        match self.store.save(&entries, true) {
            Ok(()) => ToolCallResult::text(format!(
                "Server '{name}' created. Use connect_server to open a session."
            )),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn continue_config_session(&mut self, args: &Value) -> ToolCallResult {
        let session_id = match require_str(args, "session_id") {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        let field_name = match require_str(args, "field_name") {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        // Empty is meaningful here: it accepts the field's default
        let field_value = match require_str_allow_empty(args, "field_value") {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };

        match self.wizard.advance(session_id, field_name, field_value) {
            Ok(StepOutcome::Prompt(prompt)) => ToolCallResult::text(prompt),
            Ok(StepOutcome::Complete(server)) => {
                let name = server.name.clone();
                let mut entries = BTreeMap::new();
                entries.insert(name.clone(), server);
                match self.store.save(&entries, true) {
                    Ok(()) => ToolCallResult::text(format!(
                        "Configuration complete: server '{name}' saved. Use connect_server to open a session."
                    )),
                    Err(e) => ToolCallResult::error(e.to_string()),
                }
            }
            Err(e) => ToolCallResult::error(e),
        }
    }

    fn update_server_config(&mut self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n.to_string(),
            Err(e) => return ToolCallResult::error(e),
        };
        let Some(existing) = self.store.get(&name) else {
            return ToolCallResult::error(format!("server '{name}' is not configured"));
        };
        let interactive = match opt_bool(args, "interactive", true) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };
        let cursor_interactive = match opt_bool(args, "cursor_interactive", true) {
            Ok(v) => v,
            Err(e) => return ToolCallResult::error(e),
        };

        if interactive {
            if cursor_interactive {
                let session = self.wizard.begin(Some(existing));
                return ToolCallResult::text(session.render_prompt());
            }
            return match crate::wizard::terminal::spawn_external_wizard() {
                Ok(notice) => ToolCallResult::text(notice),
                Err(e) => ToolCallResult::error(e),
            };
        }

        // Direct merge of the supplied fields over the existing record
        let mut answers = match collect_field_answers(args) {
            Ok(a) => a,
            Err(e) => return ToolCallResult::error(e),
        };
        // 'name' selects the target; renames are not part of an update
        answers.remove("name");
        if answers.is_empty() {
            return ToolCallResult::error(
                "no fields to update were provided (interactive=false expects field arguments)"
                    .to_string(),
            );
        }

        let updated = match fields::materialize(&answers, Some(&existing)) {
            Ok(s) => s,
            Err(e) => return ToolCallResult::error(e),
        };
        let mut entries = BTreeMap::new();
        entries.insert(name.clone(), updated);
        match self.store.save(&entries, true) {
            Ok(()) => ToolCallResult::text(format!("Server '{name}' updated.")),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn delete_server_config(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        match self.store.delete(name) {
            Ok(true) => ToolCallResult::text(format!("Server '{name}' deleted.")),
            Ok(false) => ToolCallResult::text(format!(
                "Server '{name}' was already absent; nothing to delete."
            )),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    fn diagnose_connection(&self, args: &Value) -> ToolCallResult {
        let name = match require_str(args, "name") {
            Ok(n) => n,
            Err(e) => return ToolCallResult::error(e),
        };
        let Some(server) = self.store.get(name) else {
            return ToolCallResult::error(format!("server '{name}' is not configured"));
        };
        ToolCallResult::text(diagnose::diagnose(self.pane.as_ref(), &server))
    }
}

/// Extracts a required, non-empty string argument.
fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, String> {
    match args.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) => Err(format!("argument '{field}' must not be empty")),
        Some(_) => Err(format!("argument '{field}' must be a string")),
        None => Err(format!("missing required argument '{field}'")),
    }
}

/// Extracts a required string argument, allowing the empty string.
fn require_str_allow_empty<'a>(args: &'a Value, field: &str) -> Result<&'a str, String> {
    match args.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("argument '{field}' must be a string")),
        None => Err(format!("missing required argument '{field}'")),
    }
}

/// Extracts an optional boolean argument; accepts JSON booleans and the
/// boolean word vocabulary.
fn opt_bool(args: &Value, field: &str, default: bool) -> Result<bool, String> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => parse_bool(s)
            .ok_or_else(|| format!("argument '{field}' must be a boolean (true/false, yes/no, 1/0)")),
        Some(_) => Err(format!("argument '{field}' must be a boolean")),
    }
}

/// Extracts the optional `timeout_sec` argument.
fn opt_timeout(args: &Value, default: Duration) -> Result<Duration, String> {
    match args.get("timeout_sec") {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| "argument 'timeout_sec' must be a positive integer".to_string()),
        Some(_) => Err("argument 'timeout_sec' must be a positive integer".to_string()),
    }
}

/// Collects wizard-schema fields present in tool arguments, validating
/// each against its field rule.
fn collect_field_answers(args: &Value) -> Result<BTreeMap<String, String>, String> {
    let mut answers = BTreeMap::new();
    for spec in fields::FIELDS {
        let Some(raw) = args.get(spec.name) else {
            continue;
        };
        let value = match raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            _ => {
                return Err(format!(
                    "argument '{}' has an unsupported type; pass a string, number or boolean",
                    spec.name
                ));
            }
        };
        fields::validate(spec, &value)?;
        answers.insert(spec.name.to_string(), value);
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::MemoryPaneManager;
    use serde_json::json;

    fn dispatcher(dir: &tempfile::TempDir) -> (ToolDispatcher, Arc<MemoryPaneManager>) {
        let pane = Arc::new(MemoryPaneManager::new());
        let store = ConfigStore::new(dir.path().join("config.yaml"));
        let orchestrator = Orchestrator::with_tunables(
            Arc::clone(&pane) as Arc<dyn PaneManager>,
            Duration::from_millis(1),
            Duration::from_millis(30),
        );
        let dispatcher = ToolDispatcher::with_orchestrator(
            store,
            Arc::clone(&pane) as Arc<dyn PaneManager>,
            orchestrator,
        );
        (dispatcher, pane)
    }

    #[test]
    fn list_servers_creates_registry_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch("list_servers", &json!({}));
        assert!(!result.is_error);
        assert!(result.text_content().contains("example-server"));
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn get_server_info_redacts_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "host": "10.0.0.1", "username": "bob", "interactive": false}),
        );
        // Password set through direct YAML write to exercise redaction
        let mut server = d.store.get("alpha").unwrap();
        server.password = Some("hunter2".to_string());
        let mut entries = BTreeMap::new();
        entries.insert("alpha".to_string(), server);
        d.store.save(&entries, true).unwrap();

        let result = d.dispatch("get_server_info", &json!({"name": "alpha"}));
        assert!(!result.is_error);
        assert!(!result.text_content().contains("hunter2"));
    }

    #[test]
    fn missing_argument_is_named_in_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch("get_server_info", &json!({}));
        assert!(result.is_error);
        assert!(result.text_content().contains("'name'"));
    }

    #[test]
    fn unknown_tool_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch("make_coffee", &json!({}));
        assert!(result.is_error);
        assert!(result.text_content().contains("make_coffee"));
    }

    #[test]
    fn direct_create_then_list_shows_both_servers() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        d.dispatch("list_servers", &json!({}));
        let result = d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "host": "10.0.0.1", "username": "bob", "port": 22, "interactive": false}),
        );
        assert!(!result.is_error, "{}", result.text_content());

        let listed = d.dispatch("list_servers", &json!({})).text_content();
        assert!(listed.contains("example-server"));
        assert!(listed.contains("alpha"));
    }

    #[test]
    fn direct_create_requires_identity_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "interactive": false}),
        );
        assert!(result.is_error);
        assert!(result.text_content().contains("'host'"));
    }

    #[test]
    fn wizard_roundtrip_via_tools() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let first = d.dispatch("create_server_config", &json!({"cursor_interactive": true}));
        assert!(!first.is_error);
        let text = first.text_content();
        assert!(text.contains("Server name"));
        let session_id = text
            .split("session_id: \"")
            .nth(1)
            .and_then(|s| s.split('"').next())
            .unwrap()
            .to_string();
        assert!(session_id.starts_with("config_"));

        for (field, value) in [
            ("name", "my-svr"),
            ("host", "10.0.0.1"),
            ("username", "bob"),
            ("port", "22"),
        ] {
            let step = d.dispatch(
                "continue_config_session",
                &json!({"session_id": session_id, "field_name": field, "field_value": value}),
            );
            assert!(!step.is_error, "{field}: {}", step.text_content());
        }

        let last = d.dispatch(
            "continue_config_session",
            &json!({"session_id": session_id, "field_name": "connection_type", "field_value": "ssh"}),
        );
        assert!(!last.is_error);
        assert!(last.text_content().contains("saved"));

        let listed = d.dispatch("list_servers", &json!({})).text_content();
        assert!(listed.contains("my-svr"));
    }

    #[test]
    fn wizard_validation_failure_keeps_the_session_on_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let first = d.dispatch("create_server_config", &json!({}));
        let text = first.text_content();
        let session_id = text
            .split("session_id: \"")
            .nth(1)
            .and_then(|s| s.split('"').next())
            .unwrap()
            .to_string();

        for (field, value) in [("name", "my-svr"), ("host", "10.0.0.1"), ("username", "bob")] {
            d.dispatch(
                "continue_config_session",
                &json!({"session_id": session_id, "field_name": field, "field_value": value}),
            );
        }

        let bad = d.dispatch(
            "continue_config_session",
            &json!({"session_id": session_id, "field_name": "port", "field_value": "99999"}),
        );
        assert!(bad.is_error);
        assert!(bad.text_content().contains("validation"));

        // The session still expects port
        let retry = d.dispatch(
            "continue_config_session",
            &json!({"session_id": session_id, "field_name": "port", "field_value": "2222"}),
        );
        assert!(!retry.is_error);
        assert!(retry.text_content().contains("connection_type") || retry.text_content().contains("Connection type"));
    }

    #[test]
    fn delete_is_idempotent_with_a_note() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "host": "10.0.0.1", "username": "bob", "interactive": false}),
        );

        let first = d.dispatch("delete_server_config", &json!({"name": "alpha"}));
        assert!(!first.is_error);
        let second = d.dispatch("delete_server_config", &json!({"name": "alpha"}));
        assert!(!second.is_error);
        assert!(second.text_content().contains("already absent"));
    }

    #[test]
    fn update_direct_merges_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "host": "10.0.0.1", "username": "bob", "interactive": false}),
        );
        let result = d.dispatch(
            "update_server_config",
            &json!({"name": "alpha", "host": "10.9.9.9", "interactive": false}),
        );
        assert!(!result.is_error, "{}", result.text_content());

        let updated = d.store.get("alpha").unwrap();
        assert_eq!(updated.host, "10.9.9.9");
        assert_eq!(updated.username, "bob");
    }

    #[test]
    fn update_unknown_server_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch(
            "update_server_config",
            &json!({"name": "ghost", "host": "10.9.9.9", "interactive": false}),
        );
        assert!(result.is_error);
        assert!(result.text_content().contains("ghost"));
    }

    #[test]
    fn get_server_status_reports_pane_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, pane) = dispatcher(&dir);

        let absent = d.dispatch("get_server_status", &json!({"name": "alpha"}));
        assert!(absent.text_content().contains("\"exists\": false"));

        pane.create("alpha_session", None).unwrap();
        pane.push_output("alpha_session", "bob@alpha:~$ ");
        let present = d.dispatch("get_server_status", &json!({"name": "alpha"}));
        assert!(present.text_content().contains("\"exists\": true"));
        assert!(present.text_content().contains("bob@alpha"));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, pane) = dispatcher(&dir);

        pane.create("alpha_session", None).unwrap();
        assert!(!d.dispatch("disconnect_server", &json!({"name": "alpha"})).is_error);
        assert!(!d.dispatch("disconnect_server", &json!({"name": "alpha"})).is_error);
        assert!(!pane.exists("alpha_session").unwrap());
    }

    #[test]
    fn execute_command_requires_a_live_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch(
            "execute_command",
            &json!({"name": "alpha", "command": "ls"}),
        );
        assert!(result.is_error);
        assert!(result.text_content().contains("connect_server"));
    }

    #[test]
    fn execute_command_returns_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, pane) = dispatcher(&dir);

        pane.create("alpha_session", None).unwrap();
        pane.respond_with(|line| {
            let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
            Some(format!("file1\nfile2\n__RT_{seq}_DONE_0"))
        });

        let result = d.dispatch(
            "execute_command",
            &json!({"name": "alpha", "command": "ls", "timeout_sec": 1}),
        );
        assert!(!result.is_error);
        let text = result.text_content();
        assert!(text.contains("exit code: 0"));
        assert!(text.contains("file1"));
    }

    #[test]
    fn run_local_command_reports_streams() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch(
            "run_local_command",
            &json!({"command": "echo out; echo err >&2"}),
        );
        assert!(!result.is_error);
        let text = result.text_content();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        assert!(text.contains("exit code: 0"));
    }

    #[test]
    fn connect_server_unknown_name_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch("connect_server", &json!({"name": "ghost"}));
        assert!(result.is_error);
        assert!(result.text_content().contains("ghost"));
    }

    #[test]
    fn connect_server_full_flow_over_fake_pane() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, pane) = dispatcher(&dir);

        d.dispatch(
            "create_server_config",
            &json!({"name": "alpha", "host": "10.0.0.1", "username": "bob", "interactive": false}),
        );
        pane.respond_with(|line| {
            line.starts_with("ssh ").then(|| "Welcome\nbob@alpha:~$ ".to_string())
        });

        let result = d.dispatch(
            "connect_server",
            &json!({"name": "alpha", "timeout_sec": 1}),
        );
        assert!(!result.is_error, "{}", result.text_content());
        assert!(result.text_content().contains("alpha_session"));
        assert!(pane.exists("alpha_session").unwrap());
    }

    #[test]
    fn invalid_timeout_type_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut d, _) = dispatcher(&dir);

        let result = d.dispatch(
            "run_local_command",
            &json!({"command": "true", "timeout_sec": "soon"}),
        );
        assert!(result.is_error);
        assert!(result.text_content().contains("timeout_sec"));
    }
}
