//! # Trackwall Model
//!
//! Shared vocabulary for the Trackwall tracker-blocking engine: tracker
//! identities, per-app block keys, verdicts, and the domain normalisation
//! rules every component agrees on.
//!
//! Everything here is a small, immutable value type. The hot-path crates
//! (`trackwall-directory`, `trackwall-engine`) pass these around by
//! `Arc` or by value; none of them carries interior mutability.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;
use std::net::IpAddr;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub mod identity;
pub mod key;

pub use identity::{canonical_company_name, TrackerIdentity};
pub use key::{BlockKey, KeyParseError};

/// Category assigned to trackers whose classification is unknown.
pub const UNCATEGORISED: &str = "Uncategorised";

/// Category assigned to ontology entries flagged as necessary services.
///
/// Necessary services are keyed by their own company name and never rolled
/// up to a root parent, so that blocking the parent does not break them.
pub const NECESSARY_CATEGORY: &str = "Content";

/// Display name of the shared hosts-list placeholder identity.
pub const HOSTLIST_NAME: &str = "Hostlist";

/// Stable identifier of an installed application.
///
/// All per-app block state is keyed by uid. The numeric value comes from
/// the platform's package manager; Trackwall only compares and hashes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    /// Returns the raw numeric value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Uid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Outcome of a tracker-blocking decision for a single flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Let the flow through.
    Allow,

    /// Drop the flow.
    Block,
}

impl Verdict {
    /// Returns true if the verdict blocks the flow.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Block)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Normalises a hostname for consistent index keys.
///
/// - Converts to lowercase
/// - Removes the trailing dot
/// - Trims whitespace
pub fn normalize_domain(domain: &str) -> CompactString {
    let domain = domain.trim().to_ascii_lowercase();
    let domain = domain.strip_suffix('.').unwrap_or(&domain);
    CompactString::from(domain)
}

/// Returns true if the string parses as an IPv4 or IPv6 literal.
pub fn is_ip_literal(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}
