//! Embedded data blobs.
//!
//! The shell rc templates and the FTP server bundle ship inside the
//! binary so that environment setup and auto-sync work on hosts with no
//! outbound network. The blobs are opaque to the core: it only copies
//! them into containers byte-for-byte.

/// One embedded rc template: target file name and contents.
#[derive(Debug, Clone, Copy)]
pub struct RcTemplate {
    /// File name under the container user's home directory.
    pub name: &'static str,
    /// Template contents.
    pub contents: &'static str,
}

/// The rc files copied into a container before switching to zsh.
pub const RC_TEMPLATES: &[RcTemplate] = &[
    RcTemplate {
        name: ".zshrc",
        contents: include_str!("../assets/shell/zshrc"),
    },
    RcTemplate {
        name: ".p10k.zsh",
        contents: include_str!("../assets/shell/p10k.zsh"),
    },
    RcTemplate {
        name: ".zsh_history",
        contents: include_str!("../assets/shell/zsh_history"),
    },
];

/// The FTP server bundle deployed by auto-sync.
///
/// A gzip tarball carrying `init.sh`, `start.sh` and the server itself;
/// the orchestrator transfers it, unpacks it under the remote workspace
/// and runs the two scripts.
pub const FTP_BUNDLE: &[u8] = include_bytes!("../assets/sync/ftp-server.tar.gz");

/// File name used for the bundle on the remote side.
pub const FTP_BUNDLE_NAME: &str = "ftp-server.tar.gz";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_templates_cover_the_expected_files() {
        let names: Vec<&str> = RC_TEMPLATES.iter().map(|t| t.name).collect();
        assert_eq!(names, vec![".zshrc", ".p10k.zsh", ".zsh_history"]);
    }

    #[test]
    fn ftp_bundle_is_a_gzip_archive() {
        assert!(FTP_BUNDLE.len() > 2);
        assert_eq!(&FTP_BUNDLE[..2], &[0x1f, 0x8b]);
    }
}
