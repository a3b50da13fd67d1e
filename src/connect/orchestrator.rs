//! The connect state machine.
//!
//! One user-level "connect" drives a pane session through:
//! kill-any-stale-session → create-fresh-session → connection sequence
//! (direct SSH, or relay login with optional jump host) → readiness
//! detection → optional container enter/create → optional shell setup →
//! optional auto-sync. Rebuilding from scratch on every connect is a
//! deliberate strategy: reusing a half-dead session proved strictly more
//! bug-prone than paying for a fresh one.
//!
//! Failures in the optional phases (environment, sync) downgrade to
//! warnings on an otherwise successful result. Failures in the mandatory
//! phases return errors, and the pane session is left alive so
//! `get_server_status` and `diagnose_connection` can inspect it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::model::{session_name, ServerConfig, ShellKind};
use crate::config::ConnectionType;
use crate::connect::driver::{PaneDriver, WaitOutcome};
use crate::connect::readiness;
use crate::connect::{environment, sync};
use crate::error::PaneError;
use crate::pane::PaneManager;

/// Command that starts the interactive relay gateway login.
pub const RELAY_COMMAND: &str = "relay-cli";

/// Fixed poll interval for readiness checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Cap on the interactive relay login wait.
pub const RELAY_TIMEOUT: Duration = Duration::from_secs(120);

/// Default overall connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that abort a connect attempt.
///
/// The pane session is preserved in every case so the user can inspect
/// what the remote side printed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The pane manager itself failed.
    #[error(transparent)]
    Pane(#[from] PaneError),

    /// The relay gateway never reached its logged-in prompt.
    #[error(
        "relay login did not complete within {seconds}s; you may need to finish an \
         interactive authentication (QR code / fingerprint / verification code) in the session"
    )]
    RelayTimeout {
        /// Seconds waited.
        seconds: u64,
        /// Last captured pane tail.
        tail: String,
    },

    /// No shell prompt appeared on the target within the timeout.
    #[error("no shell prompt within {seconds}s")]
    ShellTimeout {
        /// Seconds waited.
        seconds: u64,
        /// Last captured pane tail.
        tail: String,
    },

    /// A known fatal phrase appeared in the pane output.
    #[error("connection failed: {phrase}")]
    Fatal {
        /// The phrase that was matched.
        phrase: &'static str,
        /// Last captured pane tail.
        tail: String,
    },

    /// The configured container does not exist and auto-create is off.
    #[error("container '{container}' does not exist and docker.auto_create is disabled")]
    ContainerMissing {
        /// The configured container name.
        container: String,
    },

    /// The container never became usable.
    #[error("container '{container}' did not become ready within {seconds}s")]
    ContainerTimeout {
        /// The configured container name.
        container: String,
        /// Seconds waited.
        seconds: u64,
        /// Last captured pane tail.
        tail: String,
    },
}

impl ConnectError {
    /// The pane tail captured when the error was raised, if any.
    #[must_use]
    pub fn tail(&self) -> Option<&str> {
        match self {
            Self::Pane(_) | Self::ContainerMissing { .. } => None,
            Self::RelayTimeout { tail, .. }
            | Self::ShellTimeout { tail, .. }
            | Self::Fatal { tail, .. }
            | Self::ContainerTimeout { tail, .. } => Some(tail),
        }
    }
}

/// Successful connect result.
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    /// Name of the live pane session.
    pub session_name: String,

    /// Final prompt line observed.
    pub prompt: String,

    /// Whether an existing session was reused instead of rebuilt.
    pub reused: bool,

    /// Warnings from degraded optional phases.
    pub warnings: Vec<String>,
}

/// Composes the pane driver, readiness detector and the optional
/// environment/sync phases into the connect operation.
pub struct Orchestrator {
    driver: PaneDriver,
    relay_timeout: Duration,
}

impl Orchestrator {
    /// Production orchestrator: 5 s polls, 120 s relay cap.
    #[must_use]
    pub fn new(pane: Arc<dyn PaneManager>) -> Self {
        Self {
            driver: PaneDriver::new(pane, POLL_INTERVAL),
            relay_timeout: RELAY_TIMEOUT,
        }
    }

    /// Orchestrator with explicit tunables (tests shrink the waits).
    #[must_use]
    pub fn with_tunables(
        pane: Arc<dyn PaneManager>,
        poll_interval: Duration,
        relay_timeout: Duration,
    ) -> Self {
        Self {
            driver: PaneDriver::new(pane, poll_interval),
            relay_timeout,
        }
    }

    /// The underlying driver (shared with `execute_command`).
    #[must_use]
    pub fn driver(&self) -> &PaneDriver {
        &self.driver
    }

    /// Runs the full connect state machine for one server.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] when a mandatory phase fails; the pane
    /// session is preserved for diagnosis.
    pub fn connect(
        &self,
        server: &ServerConfig,
        timeout: Duration,
        force_recreate: bool,
    ) -> Result<ConnectOutcome, ConnectError> {
        let session = session_name(&server.name);
        let pane = self.driver.pane();

        if !force_recreate && pane.exists(&session)? {
            let tail = self.driver.capture_tail(&session)?;
            info!(server = %server.name, %session, "reusing existing session");
            return Ok(ConnectOutcome {
                session_name: session,
                prompt: readiness::last_prompt_line(&tail).unwrap_or_default().to_string(),
                reused: true,
                warnings: Vec::new(),
            });
        }

        // Unconditional rebuild
        pane.kill(&session)?;
        pane.create(&session, None)?;
        info!(server = %server.name, %session, "created fresh session");

        match server.connection_type {
            ConnectionType::Ssh => self.establish_direct_ssh(server, &session, timeout)?,
            ConnectionType::Relay => self.establish_via_relay(server, &session, timeout)?,
        }

        let mut warnings = Vec::new();

        if let Some(docker) = &server.docker {
            self.enter_container(server, &session, timeout)?;

            if docker.shell == ShellKind::Zsh {
                warnings.extend(environment::configure_zsh(&self.driver, &session));
            }
        }

        if let Some(sync_cfg) = &server.sync {
            if sync_cfg.enabled {
                warnings.extend(sync::deploy(&self.driver, &session, sync_cfg));
            }
        }

        let tail = self.driver.capture_tail(&session)?;
        let prompt = readiness::last_prompt_line(&tail).unwrap_or_default().to_string();
        info!(server = %server.name, %session, "connected");
        Ok(ConnectOutcome {
            session_name: session,
            prompt,
            reused: false,
            warnings,
        })
    }

    /// Direct SSH to the target, then wait for a shell prompt.
    fn establish_direct_ssh(
        &self,
        server: &ServerConfig,
        session: &str,
        timeout: Duration,
    ) -> Result<(), ConnectError> {
        let ssh = format!(
            "ssh -o StrictHostKeyChecking=accept-new -p {} {}@{}",
            server.port, server.username, server.host
        );
        self.driver.send_line(session, &ssh)?;
        self.await_shell(session, timeout)
    }

    /// Relay login (interactive), optional jump host, then target SSH.
    fn establish_via_relay(
        &self,
        server: &ServerConfig,
        session: &str,
        timeout: Duration,
    ) -> Result<(), ConnectError> {
        self.driver.send_line(session, RELAY_COMMAND)?;

        let relay_secs = self.relay_timeout.as_secs();
        match self.driver.wait_for(session, self.relay_timeout, readiness::relay_ready)? {
            WaitOutcome::Ready(_) => {}
            WaitOutcome::Fatal(phrase, tail) => return Err(ConnectError::Fatal { phrase, tail }),
            WaitOutcome::TimedOut(tail) => {
                return Err(ConnectError::RelayTimeout {
                    seconds: relay_secs,
                    tail,
                });
            }
        }
        debug!(session, "relay gateway logged in");

        if let Some(jump) = &server.jump_host {
            let ssh = format!("ssh -p {} {}@{}", jump.port, jump.username, jump.host);
            self.driver.send_line(session, &ssh)?;
            if let Some(password) = &jump.password {
                // One password send, nothing else; key auth is the normal path
                std::thread::sleep(self.driver.poll_interval());
                self.driver.send_line(session, password)?;
            }
        }

        let ssh = format!("ssh -p {} {}@{}", server.port, server.username, server.host);
        self.driver.send_line(session, &ssh)?;
        self.await_shell(session, timeout)
    }

    /// Polls for an interactive shell prompt.
    fn await_shell(&self, session: &str, timeout: Duration) -> Result<(), ConnectError> {
        match self.driver.wait_for(session, timeout, readiness::shell_ready)? {
            WaitOutcome::Ready(_) => Ok(()),
            WaitOutcome::Fatal(phrase, tail) => Err(ConnectError::Fatal { phrase, tail }),
            WaitOutcome::TimedOut(tail) => Err(ConnectError::ShellTimeout {
                seconds: timeout.as_secs(),
                tail,
            }),
        }
    }

    /// Ensures the configured container exists and is running, then execs
    /// into it.
    fn enter_container(
        &self,
        server: &ServerConfig,
        session: &str,
        timeout: Duration,
    ) -> Result<(), ConnectError> {
        let Some(docker) = &server.docker else {
            return Ok(());
        };
        let container = docker.container_name.as_str();

        let inspect = format!("docker inspect -f '{{{{.State.Running}}}}' {container} 2>/dev/null");
        let state = self.driver.run_command(session, &inspect, timeout)?;

        if state.success() {
            if state.output.contains("false") {
                debug!(container, "starting stopped container");
                let start = self
                    .driver
                    .run_command(session, &format!("docker start {container}"), timeout)?;
                if !start.success() {
                    return Err(ConnectError::ContainerTimeout {
                        container: container.to_string(),
                        seconds: timeout.as_secs(),
                        tail: start.output,
                    });
                }
            }
        } else if docker.auto_create {
            debug!(container, image = %docker.image, "creating container");
            let run = self
                .driver
                .run_command(session, &build_docker_run(docker), timeout)?;
            if !run.success() {
                return Err(ConnectError::ContainerTimeout {
                    container: container.to_string(),
                    seconds: timeout.as_secs(),
                    tail: run.output,
                });
            }
            // Re-check the race: run may report success while the daemon
            // is still materialising the container
            let verify = self.driver.run_command(session, &inspect, timeout)?;
            if !verify.success() {
                return Err(ConnectError::ContainerTimeout {
                    container: container.to_string(),
                    seconds: timeout.as_secs(),
                    tail: verify.output,
                });
            }
        } else {
            return Err(ConnectError::ContainerMissing {
                container: container.to_string(),
            });
        }

        // Interactive from here: no sentinel, poll the prompt instead
        self.driver
            .send_line(session, &format!("docker exec -it {container} bash"))?;
        match self
            .driver
            .wait_for(session, timeout, |tail| readiness::in_container(tail, container))?
        {
            WaitOutcome::Ready(_) => Ok(()),
            WaitOutcome::Fatal(phrase, tail) => Err(ConnectError::Fatal { phrase, tail }),
            WaitOutcome::TimedOut(tail) => {
                warn!(container, "prompt never showed the container name");
                Err(ConnectError::ContainerTimeout {
                    container: container.to_string(),
                    seconds: timeout.as_secs(),
                    tail,
                })
            }
        }
    }
}

/// Builds the `docker run` command for auto-created containers.
fn build_docker_run(docker: &crate::config::DockerConfig) -> String {
    let mut cmd = format!("docker run -d --name {}", docker.container_name);
    for port in &docker.ports {
        cmd.push_str(&format!(" -p {port}"));
    }
    for volume in &docker.volumes {
        cmd.push_str(&format!(" -v {volume}"));
    }
    if let Some(options) = &docker.run_options {
        cmd.push(' ');
        cmd.push_str(options);
    }
    cmd.push(' ');
    cmd.push_str(&docker.image);
    // Keep the container alive for exec sessions
    cmd.push_str(" tail -f /dev/null");
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ServerConfig;
    use crate::config::DockerConfig;
    use crate::pane::MemoryPaneManager;

    fn fast_orchestrator(pane: Arc<MemoryPaneManager>) -> Orchestrator {
        Orchestrator::with_tunables(pane, Duration::from_millis(1), Duration::from_millis(30))
    }

    fn ssh_server() -> ServerConfig {
        ServerConfig::new("alpha", "10.0.0.1", "bob")
    }

    // A responder that acts like a reachable SSH target
    fn ssh_target_responder(line: &str) -> Option<String> {
        line.starts_with("ssh ").then(|| "Welcome\nbob@alpha:~$ ".to_string())
    }

    #[test]
    fn connect_rebuilds_session_unconditionally() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("alpha_session", None).unwrap();
        pane.respond_with(ssh_target_responder);

        let orch = fast_orchestrator(Arc::clone(&pane));
        let outcome = orch
            .connect(&ssh_server(), Duration::from_millis(100), true)
            .unwrap();

        assert_eq!(outcome.session_name, "alpha_session");
        assert!(!outcome.reused);
        assert_eq!(pane.kills(), vec!["alpha_session"]);
        assert_eq!(pane.creations(), vec!["alpha_session", "alpha_session"]);
    }

    #[test]
    fn connect_without_force_reuses_live_session() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("alpha_session", None).unwrap();
        pane.push_output("alpha_session", "bob@alpha:~$ ");

        let orch = fast_orchestrator(Arc::clone(&pane));
        let outcome = orch
            .connect(&ssh_server(), Duration::from_millis(100), false)
            .unwrap();

        assert!(outcome.reused);
        assert!(pane.kills().is_empty());
    }

    #[test]
    fn ssh_sends_port_and_user() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(ssh_target_responder);

        let mut server = ssh_server();
        server.port = 2222;
        fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(100), true)
            .unwrap();

        let sent = pane.sent_lines("alpha_session");
        assert!(sent.iter().any(|l| l.contains("-p 2222") && l.contains("bob@10.0.0.1")));
    }

    #[test]
    fn fatal_phrase_fails_and_preserves_session() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(|line| {
            line.starts_with("ssh ").then(|| "bob@10.0.0.1: Permission denied (publickey)".to_string())
        });

        let err = fast_orchestrator(Arc::clone(&pane))
            .connect(&ssh_server(), Duration::from_millis(100), true)
            .unwrap_err();

        assert!(matches!(err, ConnectError::Fatal { phrase: "Permission denied", .. }));
        // Preserved for diagnosis
        assert!(pane.exists("alpha_session").unwrap());
    }

    #[test]
    fn shell_timeout_reports_tail() {
        let pane = Arc::new(MemoryPaneManager::new());
        // Nothing ever answers the ssh command
        let err = fast_orchestrator(Arc::clone(&pane))
            .connect(&ssh_server(), Duration::from_millis(20), true)
            .unwrap_err();

        assert!(matches!(err, ConnectError::ShellTimeout { .. }));
    }

    #[test]
    fn relay_flow_waits_for_gateway_then_sshes() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(|line| {
            if line == RELAY_COMMAND {
                Some("scan the QR code\n-bash-baidu-ssl$ ".to_string())
            } else if line.starts_with("ssh ") {
                Some("bob@target:~$ ".to_string())
            } else {
                None
            }
        });

        let mut server = ssh_server();
        server.connection_type = ConnectionType::Relay;
        let outcome = fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(100), true)
            .unwrap();

        assert!(!outcome.reused);
        let sent = pane.sent_lines("alpha_session");
        assert_eq!(sent[0], RELAY_COMMAND);
        assert!(sent.iter().any(|l| l.contains("bob@10.0.0.1")));
    }

    #[test]
    fn relay_timeout_mentions_interactive_auth() {
        let pane = Arc::new(MemoryPaneManager::new());
        // relay-cli never reaches the logged-in prompt
        let mut server = ssh_server();
        server.connection_type = ConnectionType::Relay;

        let err = fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(50), true)
            .unwrap_err();

        assert!(matches!(err, ConnectError::RelayTimeout { .. }));
        assert!(err.to_string().contains("QR code"));
    }

    #[test]
    fn jump_host_password_is_sent_once() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(|line| {
            if line == RELAY_COMMAND {
                Some("-bash-baidu-ssl$ ".to_string())
            } else if line.starts_with("ssh ") && line.contains("target") {
                Some("bob@target:~$ ".to_string())
            } else {
                None
            }
        });

        let mut server = ServerConfig::new("alpha", "target", "bob");
        server.connection_type = ConnectionType::Relay;
        server.jump_host = Some(crate::config::JumpHost {
            host: "jump.internal".to_string(),
            username: "bob".to_string(),
            port: 22,
            password: Some("jumppw".to_string()),
        });

        fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(100), true)
            .unwrap();

        let sent = pane.sent_lines("alpha_session");
        assert_eq!(sent.iter().filter(|l| l.as_str() == "jumppw").count(), 1);
        // Password goes out after the jump ssh, before the target ssh
        let jump_idx = sent.iter().position(|l| l.contains("jump.internal")).unwrap();
        let pw_idx = sent.iter().position(|l| l == "jumppw").unwrap();
        let target_idx = sent.iter().position(|l| l.contains("bob@target")).unwrap();
        assert!(jump_idx < pw_idx && pw_idx < target_idx);
    }

    #[test]
    fn missing_container_without_auto_create_is_fatal() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(|line| {
            if line.starts_with("ssh ") {
                Some("bob@alpha:~$ ".to_string())
            } else if line.contains("docker inspect") {
                // Shell echoes the sentinel with failure status
                Some(format!(
                    "__RT_{}_DONE_1",
                    line.split("__RT_").nth(1).and_then(|s| s.split('_').next()).unwrap_or("0")
                ))
            } else {
                None
            }
        });

        let mut server = ssh_server();
        server.docker = Some(DockerConfig {
            container_name: "devbox".to_string(),
            image: "ubuntu:22.04".to_string(),
            auto_create: false,
            ports: vec![],
            volumes: vec![],
            shell: ShellKind::Bash,
            run_options: None,
        });

        let err = fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(200), true)
            .unwrap_err();
        assert!(matches!(err, ConnectError::ContainerMissing { .. }));
    }

    #[test]
    fn running_container_is_entered_directly() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.respond_with(|line| {
            if line.starts_with("ssh ") {
                Some("bob@alpha:~$ ".to_string())
            } else if line.contains("docker inspect") {
                let seq = line.split("__RT_").nth(1).and_then(|s| s.split('_').next()).unwrap_or("0");
                Some(format!("true\n__RT_{seq}_DONE_0"))
            } else if line.contains("docker exec") {
                Some("root@devbox:/workspace# ".to_string())
            } else {
                None
            }
        });

        let mut server = ssh_server();
        server.docker = Some(DockerConfig {
            container_name: "devbox".to_string(),
            image: "ubuntu:22.04".to_string(),
            auto_create: false,
            ports: vec![],
            volumes: vec![],
            shell: ShellKind::Bash,
            run_options: None,
        });

        let outcome = fast_orchestrator(Arc::clone(&pane))
            .connect(&server, Duration::from_millis(200), true)
            .unwrap();
        assert!(outcome.prompt.contains("devbox"));
        let sent = pane.sent_lines("alpha_session");
        assert!(sent.iter().any(|l| l.contains("docker exec -it devbox bash")));
        // No docker start for an already-running container
        assert!(!sent.iter().any(|l| l.contains("docker start")));
    }

    #[test]
    fn docker_run_command_includes_ports_volumes_and_options() {
        let docker = DockerConfig {
            container_name: "devbox".to_string(),
            image: "ubuntu:22.04".to_string(),
            auto_create: true,
            ports: vec!["8080:80".to_string()],
            volumes: vec!["/data:/data".to_string()],
            shell: ShellKind::Bash,
            run_options: Some("--gpus all".to_string()),
        };
        let cmd = build_docker_run(&docker);
        assert!(cmd.starts_with("docker run -d --name devbox"));
        assert!(cmd.contains("-p 8080:80"));
        assert!(cmd.contains("-v /data:/data"));
        assert!(cmd.contains("--gpus all"));
        assert!(cmd.contains("ubuntu:22.04"));
    }
}
