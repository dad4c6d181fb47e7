//! Key/value storage for session data
//!
//! The request core only needs synchronous get/set/remove on a handful of
//! string keys. `FileStorage` persists them as a JSON object; every write
//! goes through an atomic temp-file + rename so a crash never leaves a
//! half-written session file. `MemoryStorage` backs tests and ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Synchronous named-key storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage backed by a JSON object file.
///
/// The Mutex serializes writers; reads take the lock only long enough to
/// clone one value.
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Load storage from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (no session yet).
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let values: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), keys = values.len(), "loaded session storage");
            values
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let values = HashMap::new();
            write_atomic(&path, &values)?;
            values
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.insert(key.to_owned(), value.to_owned());
        debug!(key, "stored value");
        write_atomic(&self.path, &state)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        if state.remove(key).is_some() {
            debug!(key, "removed value");
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }
}

/// In-process storage with no persistence.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a storage pre-populated with the given pairs.
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let state = values
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Write the session map atomically with 0600 permissions on unix.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Serialize(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
