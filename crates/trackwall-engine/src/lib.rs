//! # Trackwall Engine
//!
//! The decision evaluator and the facade the packet filter talks to.
//!
//! [`DecisionPolicy`] holds the one rule that matters: a flow is blocked
//! iff its tracker's *category* key and its *specific* key are both still
//! in block state. [`TrackerEngine`] wires the directory and the block
//! state together behind `classify`/`decide` and keeps hot-path counters.
//!
//! The internet-block and VPN-routing tiers are deliberately not folded in
//! here; the caller checks those first and short-circuits before tracker
//! classification.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{instrument, trace};

use trackwall_blockstate::BlockState;
use trackwall_directory::TrackerDirectory;
use trackwall_model::{BlockKey, TrackerIdentity, Uid, Verdict};

/// The tracker-tier blocking rule.
#[derive(Clone)]
pub struct DecisionPolicy {
    state: Arc<BlockState>,
}

impl DecisionPolicy {
    /// Creates a policy reading the given block state.
    pub fn new(state: Arc<BlockState>) -> Self {
        Self { state }
    }

    /// Evaluates the tracker-tier verdict for a flow.
    ///
    /// No identity ⇒ ALLOW: a flow is never blocked on tracker grounds
    /// without a tracker. Otherwise BLOCK iff both the category key and
    /// the `category | name` key are still blocked by default. Exempting
    /// the category makes the conjunction false for every tracker in it,
    /// so a category exemption unconditionally overrides any
    /// specific-tracker state; exempting only a specific tracker allows
    /// that one while the category default keeps blocking the rest.
    pub fn decide(&self, uid: Uid, identity: Option<&TrackerIdentity>) -> Verdict {
        let Some(identity) = identity else {
            return Verdict::Allow;
        };

        let (category_key, specific_key) = BlockKey::for_identity(identity);
        if self.state.blocked_by_default(uid, &category_key)
            && self.state.blocked_by_default(uid, &specific_key)
        {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }
}

impl std::fmt::Debug for DecisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPolicy").finish_non_exhaustive()
    }
}

/// Snapshot of the engine's flow counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Flows classified.
    pub flows_checked: u64,

    /// Flows that resolved to a tracker identity.
    pub trackers_detected: u64,

    /// Flows blocked by the tracker tier.
    pub flows_blocked: u64,
}

#[derive(Default)]
struct Counters {
    flows_checked: AtomicU64,
    trackers_detected: AtomicU64,
    flows_blocked: AtomicU64,
}

/// What the engine concluded about one flow.
#[derive(Debug, Clone)]
pub struct FlowDecision {
    /// The resolved tracker, if any.
    pub identity: Option<Arc<TrackerIdentity>>,

    /// The tracker-tier verdict.
    pub verdict: Verdict,
}

/// The classification and decision facade.
///
/// Constructed once by the application context and passed by reference to
/// the packet-filter and UI collaborators; there is no hidden global.
pub struct TrackerEngine {
    directory: Arc<TrackerDirectory>,
    state: Arc<BlockState>,
    policy: DecisionPolicy,
    counters: Counters,
}

impl TrackerEngine {
    /// Wires a directory and block state into an engine.
    pub fn new(directory: Arc<TrackerDirectory>, state: Arc<BlockState>) -> Self {
        let policy = DecisionPolicy::new(Arc::clone(&state));
        Self {
            directory,
            state,
            policy,
            counters: Counters::default(),
        }
    }

    /// Resolves a destination to a tracker identity. Called by the packet
    /// filter per connection attempt and by history logging.
    pub fn classify(&self, hostname: &str, ip: Option<&str>) -> Option<Arc<TrackerIdentity>> {
        self.directory.classify(hostname, ip)
    }

    /// Tracker-tier verdict for an already-classified flow.
    pub fn decide(&self, uid: Uid, identity: Option<&TrackerIdentity>) -> Verdict {
        self.policy.decide(uid, identity)
    }

    /// Classifies and decides in one step, updating the flow counters.
    ///
    /// Covers only the tracker tier; the caller checks
    /// [`BlockState::is_internet_blocked`] and
    /// [`BlockState::is_app_routed`] first.
    #[instrument(skip(self), level = "trace")]
    pub fn evaluate(&self, uid: Uid, hostname: &str, ip: Option<&str>) -> FlowDecision {
        self.counters.flows_checked.fetch_add(1, Ordering::Relaxed);

        let identity = self.classify(hostname, ip);
        if identity.is_some() {
            self.counters.trackers_detected.fetch_add(1, Ordering::Relaxed);
        }

        let verdict = self.decide(uid, identity.as_deref());
        if verdict.is_blocked() {
            self.counters.flows_blocked.fetch_add(1, Ordering::Relaxed);
        }

        trace!(uid = %uid, host = hostname, %verdict, "Evaluated flow");
        FlowDecision { identity, verdict }
    }

    /// The directory this engine classifies against.
    pub fn directory(&self) -> &Arc<TrackerDirectory> {
        &self.directory
    }

    /// The block state this engine evaluates against.
    pub fn block_state(&self) -> &Arc<BlockState> {
        &self.state
    }

    /// Current counter values.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            flows_checked: self.counters.flows_checked.load(Ordering::Relaxed),
            trackers_detected: self.counters.trackers_detected.load(Ordering::Relaxed),
            flows_blocked: self.counters.flows_blocked.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TrackerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerEngine")
            .field("directory", &self.directory)
            .field("state", &self.state)
            .field("stats", &self.stats())
            .finish()
    }
}
