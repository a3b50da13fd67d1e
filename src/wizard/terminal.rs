//! External-terminal wizard.
//!
//! Two halves. [`spawn_external_wizard`] is called from the MCP side: it
//! opens a local terminal window running this same binary with
//! `--setup-wizard` and returns immediately. [`run_terminal_wizard`] is
//! that re-entry point: a blocking prompt loop over the shared field
//! schema that persists the result when the user finishes.
//!
//! stdout is used freely here; the wizard runs in its own process, never
//! inside the MCP stdio stream.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::ConfigStore;
use crate::wizard::fields::{self, FieldSpec};

/// Terminal emulators tried in order on non-macOS systems, with the
/// flag that introduces the command to run.
#[cfg(not(target_os = "macos"))]
const TERMINALS: &[(&str, &str)] = &[
    ("x-terminal-emulator", "-e"),
    ("gnome-terminal", "--"),
    ("konsole", "-e"),
    ("xterm", "-e"),
];

/// Opens a local terminal window running `<current_exe> --setup-wizard`.
///
/// Returns a human-readable notice for the tool result. Configuration is
/// persisted by the spawned process when the user completes the wizard.
///
/// # Errors
///
/// Returns a message when no terminal emulator can be found or spawned.
pub fn spawn_external_wizard() -> Result<String, String> {
    let exe = std::env::current_exe()
        .map_err(|e| format!("could not resolve the running binary: {e}"))?;

    #[cfg(target_os = "macos")]
    {
        let script = format!(
            "tell application \"Terminal\" to do script \"{} --setup-wizard\"",
            exe.display()
        );
        Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("could not open Terminal.app: {e}"))?;
        return Ok(
            "A configuration window has been opened in Terminal. Complete the prompts there; \
             the server will appear in list_servers once you finish."
                .to_string(),
        );
    }

    #[cfg(not(target_os = "macos"))]
    {
        for (terminal, exec_flag) in TERMINALS {
            let Ok(path) = which::which(terminal) else {
                continue;
            };
            let spawned = Command::new(&path)
                .arg(exec_flag)
                .arg(&exe)
                .arg("--setup-wizard")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            if spawned.is_ok() {
                debug!(terminal, "external wizard window opened");
                return Ok(format!(
                    "A configuration window has been opened ({terminal}). Complete the prompts \
                     there; the server will appear in list_servers once you finish."
                ));
            }
        }
        Err(
            "no terminal emulator found (tried x-terminal-emulator, gnome-terminal, konsole, \
             xterm); use create_server_config with cursor_interactive=true instead"
                .to_string(),
        )
    }
}

/// The `--setup-wizard` re-entry point: prompts on the controlling
/// terminal, validates with the shared field rules, and persists the
/// finished record.
///
/// # Errors
///
/// Returns a message when input ends early or the final save fails.
pub fn run_terminal_wizard(store: &ConfigStore) -> Result<String, String> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    run_wizard_io(store, &mut input, &mut output)
}

/// The prompt loop, parameterised over IO for tests.
fn run_wizard_io(
    store: &ConfigStore,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String, String> {
    writeln!(output, "remote-terminal server configuration").map_err(io_err)?;
    writeln!(output, "Press Enter to accept a [default].\n").map_err(io_err)?;

    let mut answers: BTreeMap<String, String> = BTreeMap::new();
    let no_defaults = BTreeMap::new();

    while let Some(spec) = fields::next_field(&answers, &no_defaults) {
        let value = prompt_one(spec, input, output)?;
        answers.insert(spec.name.to_string(), value);
    }

    let server = fields::materialize(&answers, None)?;
    let mut entries = BTreeMap::new();
    entries.insert(server.name.clone(), server.clone());
    store.save(&entries, true).map_err(|e| e.to_string())?;

    let done = format!("Server '{}' saved to {}", server.name, store.path().display());
    writeln!(output, "\n{done}").map_err(io_err)?;
    Ok(done)
}

/// Prompts for one field until a valid answer arrives.
fn prompt_one(
    spec: &FieldSpec,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String, String> {
    loop {
        match spec.default {
            Some(default) => write!(output, "{} [{default}]: ", spec.prompt).map_err(io_err)?,
            None => write!(output, "{}: ", spec.prompt).map_err(io_err)?,
        }
        output.flush().map_err(io_err)?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(io_err)?;
        if read == 0 {
            return Err("input closed before the configuration was complete".to_string());
        }
        let trimmed = line.trim();

        let value = if trimmed.is_empty() {
            match spec.default {
                Some(default) => default.to_string(),
                None => {
                    writeln!(output, "  a value is required").map_err(io_err)?;
                    continue;
                }
            }
        } else {
            trimmed.to_string()
        };

        match fields::validate(spec, &value) {
            Ok(()) => return Ok(value),
            Err(e) => writeln!(output, "  {e}").map_err(io_err)?,
        }
    }
}

fn io_err(e: std::io::Error) -> String {
    format!("terminal wizard IO error: {e}")
}
