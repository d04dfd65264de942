//! # Trackwall Block State
//!
//! The three uid-keyed tiers of user block state:
//!
//! 1. **VPN-routing opt-out**: is this app's traffic routed through the
//!    filter at all (absent ⇒ routed)
//! 2. **Internet block**: is the entire internet blocked for this app
//! 3. **Tracker exemptions**: per-app *negative* list of category or
//!    category-and-tracker keys; an absent uid means block everything by
//!    default
//!
//! The store is read on the packet-filtering hot path and mutated from UI
//! callbacks, so single-key operations are lock-free (`DashMap`). Bulk
//! operations (load, re-import) build fresh maps and swap them through
//! `ArcSwap`, so a reader never observes a partially populated tier.
//! Eventual visibility, not linearizability, is the contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::{DashMap, DashSet};
use thiserror::Error;
use tracing::{debug, warn};

use trackwall_model::{BlockKey, Uid};

pub mod migrate;
pub mod store;

pub use migrate::{migrate_legacy_key, resolve_app_id, NoResolver, UidResolver};
pub use store::{JsonSettingsStore, MemorySettingsStore, PersistedState, SettingsStore};

/// Errors loading or persisting block state.
#[derive(Error, Debug)]
pub enum StateError {
    /// IO error from the backing store.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed persisted document.
    #[error("persisted state parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for block-state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Per-uid exemption tier state, made explicit instead of relying on
/// "key not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExemptionState {
    /// The uid has no entry: everything is blocked by default.
    DefaultBlockAll,

    /// The uid has an entry; the contained keys are exempt (possibly
    /// none, which still blocks everything but persists differently).
    Exceptions(HashSet<BlockKey>),
}

/// The three-tier block state store.
pub struct BlockState {
    routed: ArcSwap<DashMap<Uid, bool>>,
    internet_blocked: ArcSwap<DashSet<Uid>>,
    exemptions: ArcSwap<DashMap<Uid, HashSet<BlockKey>>>,
}

impl Default for BlockState {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockState {
    /// Creates an empty store: every app routed, nothing internet-blocked,
    /// every tracker blocked by default.
    pub fn new() -> Self {
        Self {
            routed: ArcSwap::from_pointee(DashMap::new()),
            internet_blocked: ArcSwap::from_pointee(DashSet::new()),
            exemptions: ArcSwap::from_pointee(DashMap::new()),
        }
    }

    // ---- VPN-routing tier ----

    /// Whether the app's traffic goes through the filter. Absent ⇒ routed.
    pub fn is_app_routed(&self, uid: Uid) -> bool {
        self.routed.load().get(&uid).map_or(true, |v| *v)
    }

    /// Sets whether the app's traffic goes through the filter.
    pub fn set_app_routed(&self, uid: Uid, routed: bool) {
        self.routed.load().insert(uid, routed);
    }

    // ---- Internet-block tier ----

    /// Whether the entire internet is blocked for the app.
    pub fn is_internet_blocked(&self, uid: Uid) -> bool {
        self.internet_blocked.load().contains(&uid)
    }

    /// Blocks the entire internet for the app.
    pub fn block_internet(&self, uid: Uid) {
        self.internet_blocked.load().insert(uid);
    }

    /// Unblocks the internet for the app.
    pub fn unblock_internet(&self, uid: Uid) {
        self.internet_blocked.load().remove(&uid);
    }

    // ---- Tracker-exemption tier ----

    /// True iff the uid has an exemption entry and `key` is in it. An
    /// absent uid is exempt for no key.
    pub fn is_exempt(&self, uid: Uid, key: &BlockKey) -> bool {
        self.exemptions
            .load()
            .get(&uid)
            .map_or(false, |set| set.contains(key))
    }

    /// The evaluator's predicate: is this key currently in block state.
    pub fn blocked_by_default(&self, uid: Uid, key: &BlockKey) -> bool {
        !self.is_exempt(uid, key)
    }

    /// Adds `key` to the uid's exception set, creating the set on first
    /// exemption.
    pub fn exempt(&self, uid: Uid, key: BlockKey) {
        self.exemptions.load().entry(uid).or_default().insert(key);
    }

    /// Removes `key` from the uid's exception set. The set stays present
    /// even when emptied; "no exceptions" and "no entry" persist
    /// differently.
    pub fn unexempt(&self, uid: Uid, key: &BlockKey) {
        if let Some(mut entry) = self.exemptions.load().get_mut(&uid) {
            entry.remove(key);
        }
    }

    /// Drops the uid's exemption entry entirely, returning it to the
    /// block-everything default.
    pub fn forget_app(&self, uid: Uid) {
        self.exemptions.load().remove(&uid);
        self.routed.load().remove(&uid);
        self.internet_blocked.load().remove(&uid);
    }

    /// The uid's exemption tier, with the default-via-absence made
    /// explicit.
    pub fn exemption_state(&self, uid: Uid) -> ExemptionState {
        match self.exemptions.load().get(&uid) {
            Some(set) => ExemptionState::Exceptions(set.value().clone()),
            None => ExemptionState::DefaultBlockAll,
        }
    }

    // ---- Persistence ----

    /// Loads persisted state, applying the legacy-key migration and
    /// best-effort uid resolution, then swaps all three tiers in at once.
    pub fn load_from(&self, store: &dyn SettingsStore, resolver: &dyn UidResolver) -> Result<()> {
        let state = store.load()?;
        self.import(&state, resolver);
        Ok(())
    }

    /// Replaces all three tiers from a document. Readers observe either
    /// the old state or the new one, never a partially cleared store.
    pub fn import(&self, state: &PersistedState, resolver: &dyn UidResolver) {
        let routed: DashMap<Uid, bool> = DashMap::new();
        for (app, value) in &state.routed {
            if let Some(uid) = resolve_app_id(app, resolver) {
                routed.insert(uid, *value);
            }
        }

        let internet: DashSet<Uid> = DashSet::new();
        for app in &state.internet_blocked {
            if let Some(uid) = resolve_app_id(app, resolver) {
                internet.insert(uid);
            }
        }

        let exemptions: DashMap<Uid, HashSet<BlockKey>> = DashMap::new();
        for (app, keys) in &state.exemptions {
            let Some(uid) = resolve_app_id(app, resolver) else {
                continue;
            };
            let mut set = HashSet::with_capacity(keys.len());
            for raw in keys {
                match migrate_legacy_key(raw) {
                    Ok(key) => {
                        set.insert(key);
                    }
                    Err(e) => {
                        warn!(uid = %uid, key = raw, error = %e, "Dropping malformed exemption key");
                    }
                }
            }
            // Present-but-empty still means "block all, no exceptions".
            exemptions.insert(uid, set);
        }

        debug!(
            routed = routed.len(),
            internet_blocked = internet.len(),
            apps_with_exemptions = exemptions.len(),
            "Imported block state"
        );

        self.routed.store(Arc::new(routed));
        self.internet_blocked.store(Arc::new(internet));
        self.exemptions.store(Arc::new(exemptions));
    }

    /// Serialises the current state into the persisted document form,
    /// keyed by decimal uid strings.
    pub fn snapshot(&self) -> PersistedState {
        let mut state = PersistedState::default();

        for entry in self.routed.load().iter() {
            state.routed.insert(entry.key().to_string(), *entry.value());
        }
        for uid in self.internet_blocked.load().iter() {
            state.internet_blocked.push(uid.to_string());
        }
        state.internet_blocked.sort();
        for entry in self.exemptions.load().iter() {
            let mut keys: Vec<String> = entry.value().iter().map(BlockKey::to_string).collect();
            keys.sort();
            state.exemptions.insert(entry.key().to_string(), keys);
        }

        state
    }

    /// Persists the current state. Called on lifecycle events such as
    /// screen pause, not on every mutation.
    pub fn persist(&self, store: &dyn SettingsStore) -> Result<()> {
        store.save(&self.snapshot())
    }
}

impl std::fmt::Debug for BlockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockState")
            .field("routed_overrides", &self.routed.load().len())
            .field("internet_blocked", &self.internet_blocked.load().len())
            .field("apps_with_exemptions", &self.exemptions.load().len())
            .finish()
    }
}
