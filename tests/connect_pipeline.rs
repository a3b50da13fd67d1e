//! Integration tests for the connect pipeline over a scripted pane.
//!
//! The in-memory pane manager plays the remote side: its responder maps
//! each sent line to the output a real shell would print, which lets the
//! whole orchestrator run in milliseconds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use remote_terminal_mcp::config::{ConfigStore, DockerConfig, ServerConfig, ShellKind, SyncConfig};
use remote_terminal_mcp::connect::Orchestrator;
use remote_terminal_mcp::pane::{MemoryPaneManager, PaneManager};
use remote_terminal_mcp::tools::ToolDispatcher;

fn harness(dir: &tempfile::TempDir) -> (ToolDispatcher, Arc<MemoryPaneManager>) {
    let pane = Arc::new(MemoryPaneManager::new());
    let store = ConfigStore::new(dir.path().join("config.yaml"));
    let orchestrator = Orchestrator::with_tunables(
        Arc::clone(&pane) as Arc<dyn PaneManager>,
        Duration::from_millis(1),
        Duration::from_millis(50),
    );
    let dispatcher = ToolDispatcher::with_orchestrator(
        store,
        Arc::clone(&pane) as Arc<dyn PaneManager>,
        orchestrator,
    );
    (dispatcher, pane)
}

fn save_server(dir: &tempfile::TempDir, server: ServerConfig) {
    let store = ConfigStore::new(dir.path().join("config.yaml"));
    let mut entries = BTreeMap::new();
    entries.insert(server.name.clone(), server);
    store.save(&entries, true).unwrap();
}

fn sentinel_status(line: &str, code: i32) -> Option<String> {
    let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
    Some(format!("__RT_{seq}_DONE_{code}"))
}

// =============================================================================
// Scenario E: reconnect rebuilds the pane
// =============================================================================

#[test]
fn test_connect_twice_rebuilds_the_session_each_time() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));
    pane.respond_with(|line| {
        line.starts_with("ssh ").then(|| "Welcome\nbob@alpha:~$ ".to_string())
    });

    let first = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    assert!(!first.is_error, "{}", first.text_content());
    assert!(pane.exists("alpha_session").unwrap());

    // Leave stray state in the session; the rebuild must erase it
    pane.push_output("alpha_session", "STRAY-STATE-MARKER");

    let second = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    assert!(!second.is_error);
    assert!(pane.exists("alpha_session").unwrap());

    // Killed once per connect, and the stray state did not survive
    assert_eq!(pane.kills(), vec!["alpha_session", "alpha_session"]);
    let tail = pane.capture("alpha_session", 40).unwrap();
    assert!(!tail.contains("STRAY-STATE-MARKER"));
}

#[test]
fn test_force_recreate_false_reuses_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));

    pane.create("alpha_session", None).unwrap();
    pane.push_output("alpha_session", "bob@alpha:~$ ");

    let result = d.dispatch(
        "connect_server",
        &json!({"name": "alpha", "force_recreate": false}),
    );
    assert!(!result.is_error);
    assert!(result.text_content().contains("Reusing"));
    assert!(pane.kills().is_empty());
}

// =============================================================================
// Failure surfaces
// =============================================================================

#[test]
fn test_fatal_phrase_reports_tail_and_preserves_session() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));
    pane.respond_with(|line| {
        line.starts_with("ssh ")
            .then(|| "bob@10.0.0.1: Permission denied (publickey,password)".to_string())
    });

    let result = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    assert!(result.is_error);
    let text = result.text_content();
    assert!(text.contains("Permission denied"));
    assert!(text.contains("Last session output"));
    // Preserved for diagnosis
    assert!(pane.exists("alpha_session").unwrap());
}

#[test]
fn test_relay_timeout_hints_at_interactive_auth() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    let mut server = ServerConfig::new("alpha", "10.0.0.1", "bob");
    server.connection_type = remote_terminal_mcp::config::ConnectionType::Relay;
    save_server(&dir, server);
    // relay-cli never logs in; no responder output at all

    let result = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    assert!(result.is_error);
    let text = result.text_content();
    assert!(text.contains("QR code"));
    assert!(pane.exists("alpha_session").unwrap());
}

// =============================================================================
// Docker, environment and sync phases through the dispatcher
// =============================================================================

#[test]
fn test_docker_zsh_and_sync_run_after_the_shell_is_live() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);

    let local_ws = dir.path().join("ws");
    let mut server = ServerConfig::new("alpha", "10.0.0.1", "bob");
    server.docker = Some(DockerConfig {
        container_name: "devbox".to_string(),
        image: "ubuntu:22.04".to_string(),
        auto_create: false,
        ports: vec![],
        volumes: vec![],
        shell: ShellKind::Zsh,
        run_options: None,
    });
    server.sync = Some(SyncConfig {
        enabled: true,
        remote_workspace: "/workspace".to_string(),
        local_workspace: local_ws.to_string_lossy().into_owned(),
        ftp_port: 8021,
        ftp_user: "sync".to_string(),
        ftp_password: "pw".to_string(),
        include_patterns: vec![],
        exclude_patterns: vec![".git/**".to_string()],
    });
    save_server(&dir, server);

    pane.respond_with(|line| {
        if line.starts_with("ssh ") {
            Some("bob@alpha:~$ ".to_string())
        } else if line.contains("docker inspect") {
            let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
            Some(format!("true\n__RT_{seq}_DONE_0"))
        } else if line.contains("docker exec") {
            Some("root@devbox:/workspace# ".to_string())
        } else if line == "exec zsh" {
            Some("devbox% ".to_string())
        } else if line.contains("__RT_") {
            sentinel_status(line, 0)
        } else {
            None
        }
    });

    let result = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 2}));
    assert!(!result.is_error, "{}", result.text_content());

    let sent = pane.sent_lines("alpha_session");
    assert!(sent.iter().any(|l| l.contains("docker exec -it devbox bash")));
    assert!(sent.iter().any(|l| l.contains("which zsh")));
    assert!(sent.iter().any(|l| l == "exec zsh"));
    assert!(sent.iter().any(|l| l.contains("tar xzf ftp-server.tar.gz")));

    // Sync emitted the editor-side client config
    let sftp = std::fs::read_to_string(local_ws.join(".vscode/sftp.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&sftp).unwrap();
    assert_eq!(parsed["port"], 8021);
    assert_eq!(parsed["remotePath"], "/workspace");
    assert_eq!(parsed["ignore"][0], ".git/**");
}

#[test]
fn test_missing_container_without_auto_create_fails_connect() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);

    let mut server = ServerConfig::new("alpha", "10.0.0.1", "bob");
    server.docker = Some(DockerConfig {
        container_name: "devbox".to_string(),
        image: "ubuntu:22.04".to_string(),
        auto_create: false,
        ports: vec![],
        volumes: vec![],
        shell: ShellKind::Bash,
        run_options: None,
    });
    save_server(&dir, server);

    pane.respond_with(|line| {
        if line.starts_with("ssh ") {
            Some("bob@alpha:~$ ".to_string())
        } else if line.contains("docker inspect") {
            sentinel_status(line, 1)
        } else {
            None
        }
    });

    let result = d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 2}));
    assert!(result.is_error);
    assert!(result.text_content().contains("auto_create"));
}

// =============================================================================
// Command execution against a live session
// =============================================================================

#[test]
fn test_execute_command_roundtrip_after_connect() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));

    pane.respond_with(|line| {
        if line.starts_with("ssh ") {
            Some("bob@alpha:~$ ".to_string())
        } else if line.contains("nvidia-smi") {
            let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
            Some(format!("GPU 0: ready\n__RT_{seq}_DONE_0"))
        } else {
            None
        }
    });

    d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    let result = d.dispatch(
        "execute_command",
        &json!({"name": "alpha", "command": "nvidia-smi", "timeout_sec": 1}),
    );
    assert!(!result.is_error);
    let text = result.text_content();
    assert!(text.contains("GPU 0: ready"));
    assert!(text.contains("exit code: 0"));
}

#[test]
fn test_execute_command_timeout_preserves_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));
    pane.create("alpha_session", None).unwrap();

    // No responder: the sentinel never comes back
    let result = d.dispatch(
        "execute_command",
        &json!({"name": "alpha", "command": "sleep 999", "timeout_sec": 1}),
    );
    assert!(result.is_error);
    assert!(result.text_content().contains("did not complete"));
    assert!(pane.exists("alpha_session").unwrap());
}

// =============================================================================
// Status and disconnect around the pipeline
// =============================================================================

#[test]
fn test_status_reflects_connect_and_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let (mut d, pane) = harness(&dir);
    save_server(&dir, ServerConfig::new("alpha", "10.0.0.1", "bob"));
    pane.respond_with(|line| {
        line.starts_with("ssh ").then(|| "bob@alpha:~$ ".to_string())
    });

    let before = d.dispatch("get_server_status", &json!({"name": "alpha"}));
    assert!(before.text_content().contains("\"exists\": false"));

    d.dispatch("connect_server", &json!({"name": "alpha", "timeout_sec": 1}));
    let during = d.dispatch("get_server_status", &json!({"name": "alpha"}));
    assert!(during.text_content().contains("\"exists\": true"));

    d.dispatch("disconnect_server", &json!({"name": "alpha"}));
    let after = d.dispatch("get_server_status", &json!({"name": "alpha"}));
    assert!(after.text_content().contains("\"exists\": false"));
}
