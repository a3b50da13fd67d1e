//! Auto-sync deployment.
//!
//! Runs the embedded FTP server inside the container and writes the
//! matching client configuration on the local side, so a local editor
//! can treat remote files as local. The transfer goes through the pane
//! as base64 chunks; the container needs no outbound network.
//!
//! Every failure here downgrades to a warning: the connection as a whole
//! stays successful as long as the shell is live.

use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::assets::{FTP_BUNDLE, FTP_BUNDLE_NAME};
use crate::config::SyncConfig;
use crate::connect::driver::PaneDriver;

/// Timeout for each remote step.
const STEP_TIMEOUT: Duration = Duration::from_secs(60);

/// Attempts made when probing the FTP port.
const PROBE_ATTEMPTS: u32 = 5;

/// Deploys the FTP server and writes the local client config.
/// Returns warnings for every step that degraded.
#[must_use]
pub fn deploy(driver: &PaneDriver, session: &str, cfg: &SyncConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Err(warning) = deploy_remote(driver, session, cfg) {
        warnings.push(warning);
        // The local config is still useful once the user starts the
        // server by hand, so keep going
    }

    if let Err(warning) = write_client_config(cfg) {
        warnings.push(warning);
    }

    warnings
}

/// Transfers, unpacks and starts the server bundle, then probes its port.
fn deploy_remote(driver: &PaneDriver, session: &str, cfg: &SyncConfig) -> Result<(), String> {
    let workspace = cfg.remote_workspace.trim_end_matches('/');
    let bundle_path = format!("{workspace}/{FTP_BUNDLE_NAME}");

    driver
        .run_command(session, &format!("mkdir -p {}", quote(workspace)), STEP_TIMEOUT)
        .map_err(|e| format!("sync: could not prepare workspace: {e}"))?;

    let uploaded = driver
        .upload(session, FTP_BUNDLE, &bundle_path, STEP_TIMEOUT)
        .map_err(|e| format!("sync: bundle transfer failed: {e}"))?;
    if !uploaded.success() {
        return Err("sync: bundle transfer did not complete".to_string());
    }
    debug!(session, %bundle_path, "bundle transferred");

    let unpack = driver
        .run_command(
            session,
            &format!("cd {} && tar xzf {FTP_BUNDLE_NAME}", quote(workspace)),
            STEP_TIMEOUT,
        )
        .map_err(|e| format!("sync: unpack failed: {e}"))?;
    if !unpack.success() {
        return Err("sync: could not unpack the server bundle".to_string());
    }

    let env = format!(
        "FTP_PORT={} FTP_USER={} FTP_PASSWORD={} FTP_ROOT={}",
        cfg.ftp_port,
        quote(&cfg.ftp_user),
        quote(&cfg.ftp_password),
        quote(workspace),
    );
    let start = driver
        .run_command(
            session,
            &format!("cd {} && {env} sh init.sh && {env} sh start.sh", quote(workspace)),
            STEP_TIMEOUT,
        )
        .map_err(|e| format!("sync: server start failed: {e}"))?;
    if !start.success() {
        return Err("sync: server scripts reported failure".to_string());
    }

    probe_port(driver, session, cfg.ftp_port)
}

/// Checks the server is listening by opening a TCP connection from
/// inside the container.
fn probe_port(driver: &PaneDriver, session: &str, port: u16) -> Result<(), String> {
    for attempt in 0..PROBE_ATTEMPTS {
        let probe = driver
            .run_command(
                session,
                &format!("bash -c 'exec 3<>/dev/tcp/127.0.0.1/{port}' 2>/dev/null"),
                STEP_TIMEOUT,
            )
            .map_err(|e| format!("sync: port probe failed: {e}"))?;
        if probe.success() {
            debug!(session, port, "sync server is listening");
            return Ok(());
        }
        if attempt + 1 < PROBE_ATTEMPTS {
            std::thread::sleep(driver.poll_interval());
        }
    }
    warn!(session, port, "sync server port never opened");
    Err(format!("sync: nothing is listening on port {port}"))
}

/// Writes `<local_workspace>/.vscode/sftp.json` for the editor side.
fn write_client_config(cfg: &SyncConfig) -> Result<(), String> {
    let dir = Path::new(&cfg.local_workspace).join(".vscode");
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("sync: could not create {}: {e}", dir.display()))?;

    let config = json!({
        "host": "localhost",
        "port": cfg.ftp_port,
        "username": cfg.ftp_user,
        "password": cfg.ftp_password,
        "remotePath": cfg.remote_workspace,
        "uploadOnSave": true,
        "ignore": cfg.exclude_patterns,
    });
    let path = dir.join("sftp.json");
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("sync: could not render client config: {e}"))?;
    std::fs::write(&path, rendered)
        .map_err(|e| format!("sync: could not write {}: {e}", path.display()))?;
    debug!(path = %path.display(), "client config written");
    Ok(())
}

/// Single-quotes a value for `sh`, escaping embedded quotes.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
