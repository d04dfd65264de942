//! Tracker identities.
//!
//! A [`TrackerIdentity`] names the tracking company (or hosts-list
//! placeholder) a destination belongs to. Identities are immutable once
//! constructed; the directory shares them behind `Arc` across the index.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::{HOSTLIST_NAME, UNCATEGORISED};

/// Rewrites holding-company aliases to the public brand so that identities
/// from different ontology sources compare equal by name.
pub fn canonical_company_name(name: &str) -> &str {
    match name {
        "Alphabet" => "Google",
        "Meta Platforms" => "Facebook",
        other => other,
    }
}

/// A named tracking company, or a hosts-list placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerIdentity {
    name: CompactString,
    category: CompactString,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<CompactString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_country: Option<CompactString>,
    uncertain: bool,
}

impl TrackerIdentity {
    /// Creates an identity for a company from an ontology source.
    ///
    /// The name is canonicalised; a missing category defaults to
    /// [`UNCATEGORISED`].
    pub fn new(name: &str, category: Option<&str>) -> Self {
        Self {
            name: CompactString::from(canonical_company_name(name)),
            category: CompactString::from(category.unwrap_or(UNCATEGORISED)),
            country: None,
            source_country: None,
            uncertain: false,
        }
    }

    /// Sets the country the tracking endpoint operates from.
    pub fn with_country(mut self, country: Option<&str>) -> Self {
        self.country = country.map(CompactString::from);
        self
    }

    /// Sets the country of the owning company.
    pub fn with_source_country(mut self, country: Option<&str>) -> Self {
        self.source_country = country.map(CompactString::from);
        self
    }

    /// Creates a per-domain identity for domain-based blocking.
    ///
    /// The display name embeds both the domain and the owning company, so
    /// two domains of the same company stay independently blockable while
    /// keeping the company's category.
    pub fn per_domain(domain: &str, company: &str, category: Option<&str>) -> Self {
        let company = canonical_company_name(company);
        Self {
            name: CompactString::from(format!("{domain} ({company})")),
            category: CompactString::from(category.unwrap_or(UNCATEGORISED)),
            country: None,
            source_country: None,
            uncertain: false,
        }
    }

    /// Creates an ad-hoc identity for a destination known only from a
    /// merged hosts list or the static IP set.
    pub fn synthesised(destination: &str) -> Self {
        Self {
            name: CompactString::from(destination),
            category: CompactString::from(UNCATEGORISED),
            country: None,
            source_country: None,
            uncertain: true,
        }
    }

    /// The shared placeholder for hosts-list-only destinations under
    /// domain-based blocking, collapsing them into one blockable unit.
    pub fn hostlist() -> Self {
        Self {
            name: CompactString::from(HOSTLIST_NAME),
            category: CompactString::from(UNCATEGORISED),
            country: None,
            source_country: None,
            uncertain: true,
        }
    }

    /// Canonicalised company or placeholder name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category label, [`UNCATEGORISED`] when unknown.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Country the endpoint operates from, when known.
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Country of the owning company, when known.
    pub fn source_country(&self) -> Option<&str> {
        self.source_country.as_deref()
    }

    /// True for identities synthesised outside the ontology sources.
    pub fn is_uncertain(&self) -> bool {
        self.uncertain
    }
}

impl fmt::Display for TrackerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.category)
    }
}
