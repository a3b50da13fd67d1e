//! Connection diagnosis.
//!
//! Best-effort inspection for the `diagnose_connection` tool: what does
//! the pane show, is the host reachable from here, is the relay CLI
//! installed. Produces advice, never errors; a broken environment is
//! exactly when this tool has to keep working.

use std::time::Duration;

use crate::config::model::{session_name, ServerConfig};
use crate::config::ConnectionType;
use crate::connect::orchestrator::RELAY_COMMAND;
use crate::connect::readiness;
use crate::local;
use crate::pane::{PaneManager, DEFAULT_TAIL_LINES};

/// Timeout for the reachability ping.
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a multi-line diagnosis report for one server.
#[must_use]
pub fn diagnose(pane: &dyn PaneManager, server: &ServerConfig) -> String {
    let session = session_name(&server.name);
    let mut report = vec![format!("Diagnosis for '{}':", server.name)];
    let mut advice = Vec::new();

    // Pane state
    match pane.exists(&session) {
        Ok(true) => {
            report.push(format!("- session '{session}' exists"));
            if let Ok(tail) = pane.capture(&session, DEFAULT_TAIL_LINES) {
                if let Some(phrase) = readiness::fatal_error(&tail) {
                    report.push(format!("- session output contains a fatal marker: {phrase}"));
                    advice.push(format!(
                        "the last attempt failed with '{phrase}'; check credentials and retry connect_server"
                    ));
                }
                if let Some(prompt) = readiness::last_prompt_line(&tail) {
                    report.push(format!("- last prompt line: {prompt}"));
                }
            }
        }
        Ok(false) => {
            report.push(format!("- session '{session}' does not exist"));
            advice.push("run connect_server to create the session".to_string());
        }
        Err(e) => {
            report.push(format!("- pane manager unavailable: {e}"));
            advice.push("install tmux and retry".to_string());
        }
    }

    // Host reachability
    let ping = format!("ping -c 2 -W 2 {}", server.host);
    match local::run(&ping, PING_TIMEOUT) {
        Ok(out) if out.success => report.push(format!("- host {} answers ping", server.host)),
        Ok(_) => {
            report.push(format!("- host {} does not answer ping", server.host));
            advice.push(
                "the host is unreachable from this machine; check network/VPN (ICMP may also be filtered)"
                    .to_string(),
            );
        }
        Err(e) => report.push(format!("- ping could not be run: {e}")),
    }

    // Relay tooling
    if server.connection_type == ConnectionType::Relay {
        if which::which(RELAY_COMMAND).is_ok() {
            report.push(format!("- {RELAY_COMMAND} is installed"));
        } else {
            report.push(format!("- {RELAY_COMMAND} is NOT installed"));
            advice.push(format!(
                "install {RELAY_COMMAND} before connecting through the relay gateway"
            ));
        }
    }

    if advice.is_empty() {
        report.push("- no obvious problems found".to_string());
    } else {
        report.push(String::new());
        report.push("Advice:".to_string());
        for item in advice {
            report.push(format!("- {item}"));
        }
    }

    report.join("\n")
}
