//! Registry persistence.
//!
//! The YAML file under `~/.remote-terminal/` is the single source of
//! truth. Nothing is cached across tool calls: every operation re-reads
//! the file, so concurrent invocations only have to agree at the write
//! path, which is guarded by the advisory lock and an atomic
//! temp-file-then-rename sequence.
//!
//! Read operations never mutate the file. The one creation path is
//! [`ConfigStore::ensure_exists`], which writes the `example-server`
//! placeholder only when the file is missing entirely.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::lock;
use crate::config::model::{example_server, Registry, ServerConfig};
use crate::error::ConfigError;

/// Directory under the user's home holding the registry.
const CONFIG_DIR_NAME: &str = ".remote-terminal";

/// Registry file name.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Loads and persists the server registry.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store backed by an explicit file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store at the default location, `~/.remote-terminal/config.yaml`.
    ///
    /// Falls back to a relative path when the home directory cannot be
    /// determined (containers with no HOME).
    #[must_use]
    pub fn at_default_location() -> Self {
        let path = dirs::home_dir()
            .map_or_else(|| PathBuf::from(CONFIG_DIR_NAME), |h| h.join(CONFIG_DIR_NAME))
            .join(CONFIG_FILE_NAME);
        Self { path }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the registry from disk.
    ///
    /// A missing or unparsable file yields an empty registry; read paths
    /// never repair or rewrite the file.
    #[must_use]
    pub fn load(&self) -> Registry {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "registry not readable, treating as empty");
                return Registry::default();
            }
        };

        match serde_yaml::from_str::<Registry>(&contents) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "registry unparsable, treating as empty");
                Registry::default()
            }
        }
    }

    /// Returns one server record by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ServerConfig> {
        self.load().servers.get(name).cloned()
    }

    /// First-run policy: create the file with a single `example-server`
    /// when it does not exist. An existing file, even one holding an
    /// empty mapping, is left untouched.
    ///
    /// Returns whether the file was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or the write fails.
    pub fn ensure_exists(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }

        let _guard = lock::acquire(&self.path)?;
        // Re-check under the lock: another call may have created it
        if self.path.exists() {
            return Ok(false);
        }

        let mut registry = Registry::default();
        let example = example_server();
        registry.servers.insert(example.name.clone(), example);
        self.write_atomically(&registry)?;
        debug!(path = %self.path.display(), "created registry with example-server");
        Ok(true)
    }

    /// Persists `new_entries`, merging over the current file contents.
    ///
    /// With `merge` set, the current file is re-read under the lock and
    /// each incoming server replaces its key wholesale; callers supply
    /// complete records, so there is no per-field merge. Existing servers
    /// not named in `new_entries` are preserved byte-for-byte. With
    /// `merge` unset the incoming registry replaces the file.
    ///
    /// # Errors
    ///
    /// Returns an error on lock contention, serialisation or IO failure,
    /// or when the post-write verification cannot find an incoming key in
    /// the re-read file.
    pub fn save(
        &self,
        new_entries: &BTreeMap<String, ServerConfig>,
        merge: bool,
    ) -> Result<(), ConfigError> {
        let _guard = lock::acquire(&self.path)?;

        let mut registry = if merge { self.load() } else { Registry::default() };
        for (name, server) in new_entries {
            registry.servers.insert(name.clone(), server.clone());
        }

        self.write_atomically(&registry)?;

        // Re-read and assert every incoming key landed on disk
        let reread = self.load();
        for name in new_entries.keys() {
            if !reread.servers.contains_key(name) {
                return Err(ConfigError::VerifyFailed {
                    name: name.clone(),
                    path: self.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Removes one server. Idempotent: removing an absent name succeeds
    /// and reports `false`.
    ///
    /// # Errors
    ///
    /// Returns an error on lock contention or IO failure.
    pub fn delete(&self, name: &str) -> Result<bool, ConfigError> {
        let _guard = lock::acquire(&self.path)?;

        let mut registry = self.load();
        let removed = registry.servers.remove(name).is_some();
        if removed {
            self.write_atomically(&registry)?;
        }
        Ok(removed)
    }

    /// Serialises the registry to a sibling temp file, fsyncs it, and
    /// renames it over the target. A crash at any point leaves either the
    /// old file or the new one, never a truncated intermediate.
    fn write_atomically(&self, registry: &Registry) -> Result<(), ConfigError> {
        let parent = self
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&parent).map_err(|source| ConfigError::WriteError {
            path: parent.clone(),
            source,
        })?;

        let yaml =
            serde_yaml::to_string(registry).map_err(|e| ConfigError::SerialiseError {
                message: e.to_string(),
            })?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|source| ConfigError::WriteError {
                path: parent.clone(),
                source,
            })?;
        tmp.write_all(yaml.as_bytes())
            .map_err(|source| ConfigError::WriteError {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| ConfigError::WriteError {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&self.path)
            .map_err(|e| ConfigError::WriteError {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}
