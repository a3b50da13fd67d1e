//! Readiness detection over captured pane output.
//!
//! Pure, stateless functions from a captured tail window to a verdict.
//! Detection is a handful of fixed substring tests; no pattern engine.
//! Callers pass the last ~40 lines of capture ([`tail_window`] bounds the
//! window if the input is larger), which keeps the checks cheap no matter
//! how much scrollback the pane holds.

/// Marker printed by the relay gateway once login completes.
pub const RELAY_PROMPT: &str = "-bash-baidu-ssl$";

/// Phrases that mean the connection attempt is dead.
pub const FATAL_PHRASES: &[&str] = &[
    "Permission denied",
    "Connection refused",
    "No route to host",
    "Authentication failed",
];

/// Bounds `text` to its last `lines` lines.
#[must_use]
pub fn tail_window(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let keep = all.len().saturating_sub(lines);
    all[keep..].join("\n")
}

/// Last non-empty line of the capture, if any.
#[must_use]
pub fn last_prompt_line(tail: &str) -> Option<&str> {
    tail.lines().rev().map(str::trim_end).find(|l| !l.is_empty())
}

/// Whether the relay gateway has finished its interactive login.
#[must_use]
pub fn relay_ready(tail: &str) -> bool {
    tail.contains(RELAY_PROMPT)
}

/// Whether the capture ends at an interactive shell prompt.
///
/// True when the last non-empty line ends in `$` or `#` (trailing
/// whitespace ignored), which covers both plain and decorated prompts
/// after the login banner has scrolled past.
#[must_use]
pub fn shell_ready(tail: &str) -> bool {
    last_prompt_line(tail).is_some_and(|line| line.ends_with('$') || line.ends_with('#'))
}

/// Whether the prompt shows we are inside the named container.
///
/// The container name must appear on the prompt line itself, as in
/// `root@<container>:/workspace#` or `user@host:path$` forms that embed
/// the name.
#[must_use]
pub fn in_container(tail: &str, container_name: &str) -> bool {
    last_prompt_line(tail).is_some_and(|line| {
        line.contains(container_name) && (line.ends_with('$') || line.ends_with('#'))
    })
}

/// Returns the first fatal phrase present in the capture, if any.
#[must_use]
pub fn fatal_error(tail: &str) -> Option<&'static str> {
    FATAL_PHRASES.iter().copied().find(|p| tail.contains(p))
}
