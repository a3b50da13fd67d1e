//! In-container shell environment setup.
//!
//! Given a container pane already sitting at a bash prompt, land the
//! user in zsh with the embedded rc files in place. Every step here is
//! best-effort: a failure downgrades to a warning and the connection
//! stays on bash.

use std::time::Duration;

use tracing::{debug, warn};

use crate::assets::RC_TEMPLATES;
use crate::connect::driver::PaneDriver;

/// Timeout for quick checks (`which`, `test -f`, `ls`).
const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the package-manager install attempt.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(180);

/// Home directory of the container account the rc files belong to.
const TARGET_HOME: &str = "/root";

/// Installs zsh if needed, copies the rc templates, and switches the
/// pane to zsh. Returns warnings for every step that degraded.
#[must_use]
pub fn configure_zsh(driver: &PaneDriver, session: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    match ensure_zsh_installed(driver, session) {
        Ok(()) => {}
        Err(warning) => {
            // No zsh means nothing else here can work; stay on bash
            warnings.push(warning);
            return warnings;
        }
    }

    for template in RC_TEMPLATES {
        let target = format!("{TARGET_HOME}/{}", template.name);
        match install_rc_file(driver, session, &target, template.contents) {
            Ok(()) => debug!(session, file = template.name, "rc file in place"),
            Err(warning) => warnings.push(warning),
        }
    }

    if let Err(warning) = switch_to_zsh(driver, session) {
        warnings.push(warning);
    }

    warnings
}

/// Verifies zsh is present, attempting a best-effort install when not.
fn ensure_zsh_installed(driver: &PaneDriver, session: &str) -> Result<(), String> {
    let check = |driver: &PaneDriver| {
        driver
            .run_command(session, "which zsh", STEP_TIMEOUT)
            .map(|r| r.success())
            .unwrap_or(false)
    };

    if check(driver) {
        return Ok(());
    }

    debug!(session, "zsh missing, attempting package install");
    let install = driver.run_command(
        session,
        "apt-get install -y zsh || yum install -y zsh",
        INSTALL_TIMEOUT,
    );
    if let Err(e) = install {
        warn!(session, error = %e, "zsh install could not be driven");
    }

    if check(driver) {
        Ok(())
    } else {
        Err("zsh is not installed and could not be installed; staying with bash".to_string())
    }
}

/// Puts one rc file in place with an exact name.
///
/// The target is removed first: the copy tool would otherwise silently
/// rename on collision and leave the file with the wrong name.
fn install_rc_file(
    driver: &PaneDriver,
    session: &str,
    target: &str,
    contents: &str,
) -> Result<(), String> {
    let present = driver
        .run_command(session, &format!("test -f {target}"), STEP_TIMEOUT)
        .map(|r| r.success())
        .unwrap_or(false);
    if present {
        return Ok(());
    }

    driver
        .run_command(session, &format!("rm -f {target}"), STEP_TIMEOUT)
        .map_err(|e| format!("could not clear {target}: {e}"))?;

    let copied = driver
        .upload(session, contents.as_bytes(), target, STEP_TIMEOUT)
        .map_err(|e| format!("could not copy {target}: {e}"))?;
    if !copied.success() {
        return Err(format!("copy of {target} did not complete"));
    }

    let verify = driver
        .run_command(session, &format!("ls {target}"), STEP_TIMEOUT)
        .map_err(|e| format!("could not verify {target}: {e}"))?;
    if verify.success() {
        Ok(())
    } else {
        Err(format!("{target} missing after copy"))
    }
}

/// Replaces the pane's shell with zsh, skipping the first-run theme
/// wizard if it appears.
fn switch_to_zsh(driver: &PaneDriver, session: &str) -> Result<(), String> {
    driver
        .send_line(session, "exec zsh")
        .map_err(|e| format!("could not switch to zsh: {e}"))?;

    std::thread::sleep(driver.poll_interval());
    let tail = driver
        .capture_tail(session)
        .map_err(|e| format!("could not capture after zsh switch: {e}"))?;

    if tail.contains("Powerlevel10k") || tail.contains("configuration wizard") {
        debug!(session, "skipping first-run theme wizard");
        driver
            .pane()
            .send_keys(session, "q", false)
            .map_err(|e| format!("could not skip theme wizard: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::{MemoryPaneManager, PaneManager};
    use std::sync::Arc;

    fn driver(pane: Arc<MemoryPaneManager>) -> PaneDriver {
        PaneDriver::new(pane, Duration::from_millis(1))
    }

    fn sentinel_ok(line: &str) -> Option<String> {
        let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
        Some(format!("__RT_{seq}_DONE_0"))
    }

    #[test]
    fn present_rc_files_are_not_rewritten() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        // Everything succeeds: zsh installed, files present
        pane.respond_with(|line| line.contains("__RT_").then(|| sentinel_ok(line)).flatten());

        let warnings = configure_zsh(&driver(Arc::clone(&pane)), "s");
        assert!(warnings.is_empty());

        let sent = pane.sent_lines("s");
        assert!(!sent.iter().any(|l| l.contains("base64 -d")));
        assert!(sent.iter().any(|l| l == "exec zsh"));
    }

    #[test]
    fn missing_zsh_downgrades_to_warning() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        // Every sentinel command fails, including `which zsh`
        pane.respond_with(|line| {
            let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
            Some(format!("__RT_{seq}_DONE_1"))
        });

        let warnings = configure_zsh(&driver(Arc::clone(&pane)), "s");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("bash"));

        // Install was attempted before giving up
        let sent = pane.sent_lines("s");
        assert!(sent.iter().any(|l| l.contains("apt-get install")));
        // But no shell switch happened
        assert!(!sent.iter().any(|l| l == "exec zsh"));
    }

    #[test]
    fn missing_rc_file_is_cleared_copied_and_verified() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        pane.respond_with(|line| {
            let seq = line.split("__RT_").nth(1)?.split('_').next()?.to_string();
            // zsh present, `test -f` fails, everything else succeeds
            if line.starts_with("test -f") {
                Some(format!("__RT_{seq}_DONE_1"))
            } else {
                Some(format!("__RT_{seq}_DONE_0"))
            }
        });

        let warnings = configure_zsh(&driver(Arc::clone(&pane)), "s");
        assert!(warnings.is_empty());

        let sent = pane.sent_lines("s");
        assert!(sent.iter().any(|l| l.starts_with("rm -f '/root/.zshrc")));
        assert!(sent.iter().any(|l| l.contains("base64 -d '/root/.zshrc'")));
        assert!(sent.iter().any(|l| l.starts_with("ls /root/.zshrc")));
    }

    #[test]
    fn theme_wizard_is_skipped_with_q() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        pane.respond_with(|line| {
            if line == "exec zsh" {
                Some("Powerlevel10k configuration wizard".to_string())
            } else {
                sentinel_ok(line)
            }
        });

        let warnings = configure_zsh(&driver(Arc::clone(&pane)), "s");
        assert!(warnings.is_empty());
        let sent = pane.sent_lines("s");
        assert_eq!(sent.last().map(String::as_str), Some("q"));
    }
}
