//! Persisted key/value storage for block state.
//!
//! The engine does not own a storage schema; it reads and writes one
//! [`PersistedState`] document through the [`SettingsStore`] seam. Keys are
//! strings because historical storage keyed entries by app identifier
//! strings, some of which predate numeric uids.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// The block-state document as it sits in key/value storage.
///
/// `exemptions` maps an app identifier to its exception keys in the
/// historical `"<category> | <name>"` string format. A present-but-empty
/// list means "block all trackers for this app with no exceptions", which
/// is distinct from the identifier being absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// App identifier → whether its traffic is routed through the filter.
    #[serde(default)]
    pub routed: BTreeMap<String, bool>,

    /// App identifiers with the entire internet blocked.
    #[serde(default)]
    pub internet_blocked: Vec<String>,

    /// App identifier → exemption keys (negative list).
    #[serde(default)]
    pub exemptions: BTreeMap<String, Vec<String>>,
}

/// External key/value storage holding the block-state document.
pub trait SettingsStore: Send + Sync {
    /// Loads the persisted document. A store with no prior document
    /// returns the default (empty) state.
    fn load(&self) -> Result<PersistedState>;

    /// Persists the document.
    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON-file-backed settings store.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Creates a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<PersistedState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted block state, starting empty");
            return Ok(PersistedState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }
}

/// In-memory settings store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<PersistedState>,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with a document.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<PersistedState> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.inner.lock() = state.clone();
        Ok(())
    }
}
