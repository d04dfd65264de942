//! # Trackwall Directory
//!
//! The static tracker/company directory and the hostname/IP classifier.
//!
//! The directory holds one exact-domain → [`TrackerIdentity`] index built
//! from two ordered ontology sources plus a static IP-literal set, and
//! consults the merged hosts blocklist through the [`HostSet`] seam. The
//! classifier resolves a destination to an identity with an exact lookup,
//! a suffix walk, and the hosts/IP fallbacks, in that order.
//!
//! ## Concurrency
//!
//! Reads vastly outnumber writes. The index and IP set live behind
//! `ArcSwap` so a reload swaps a freshly built map without readers ever
//! observing a half-populated directory. Lazily synthesised identities are
//! written back into the live index; racing first lookups may both
//! synthesise, and last-writer-wins is the accepted resolution.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use compact_str::CompactString;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use trackwall_model::{is_ip_literal, normalize_domain, TrackerIdentity, NECESSARY_CATEGORY};

pub mod hosts;
pub mod ontology;

pub use hosts::{HostSet, StaticHostSet};
pub use ontology::OntologyRecord;

/// Errors reading directory assets.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// IO error while reading an asset.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed ontology JSON.
    #[error("ontology parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Construction options for the directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    /// Give every domain its own identity instead of deduplicating by
    /// owning company. Changes identity granularity, not index contents.
    pub domain_based_blocking: bool,
}

/// Paths of the bundled assets the directory loads.
#[derive(Debug, Clone, Default)]
pub struct DirectorySources {
    /// Ontology source A: the broad company/country taxonomy.
    pub companies: Option<PathBuf>,

    /// Ontology source B: the curated category taxonomy. Loaded after A;
    /// wins exact-key collisions.
    pub categories: Option<PathBuf>,

    /// Static newline-delimited IP blocklist, `#` comments ignored.
    pub ip_list: Option<PathBuf>,
}

/// What a (re)load actually managed to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Ontology sources successfully read.
    pub sources_loaded: usize,

    /// Ontology sources skipped because missing or malformed.
    pub sources_skipped: usize,

    /// Domains in the rebuilt index.
    pub domains_indexed: usize,

    /// IP literals in the rebuilt set.
    pub ips_loaded: usize,
}

type DomainIndex = DashMap<CompactString, Arc<TrackerIdentity>>;

/// The exact-domain → tracker index, IP set, and classifier.
pub struct TrackerDirectory {
    index: ArcSwap<DomainIndex>,
    ip_set: ArcSwap<DashSet<CompactString>>,
    hosts: RwLock<Arc<dyn HostSet>>,
    hostlist: Arc<TrackerIdentity>,
    domain_based: bool,
}

impl TrackerDirectory {
    /// Creates an empty directory. An empty directory classifies nothing
    /// as a tracker, which is the safe degraded state.
    pub fn new(options: DirectoryOptions) -> Self {
        Self {
            index: ArcSwap::from_pointee(DashMap::new()),
            ip_set: ArcSwap::from_pointee(DashSet::new()),
            hosts: RwLock::new(Arc::new(StaticHostSet::new())),
            hostlist: Arc::new(TrackerIdentity::hostlist()),
            domain_based: options.domain_based_blocking,
        }
    }

    /// Replaces the merged-hosts membership predicate. Called whenever the
    /// hosts-file merge collaborator completes a rebuild.
    pub fn set_hosts(&self, hosts: Arc<dyn HostSet>) {
        *self.hosts.write() = hosts;
    }

    /// (Re)builds the index and IP set from the bundled assets.
    ///
    /// Missing or malformed sources are logged and skipped; the directory
    /// keeps whatever loaded successfully and never fails fatally. The
    /// rebuilt index is swapped in atomically.
    pub fn load(&self, sources: &DirectorySources) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let index: DomainIndex = DashMap::new();

        for (label, path) in [
            ("companies", sources.companies.as_deref()),
            ("categories", sources.categories.as_deref()),
        ] {
            let Some(path) = path else {
                debug!(source = label, "No ontology source configured");
                continue;
            };
            match ontology::read_records(path) {
                Ok(records) => {
                    self.populate(&index, &records);
                    summary.sources_loaded += 1;
                    debug!(source = label, records = records.len(), "Loaded ontology source");
                }
                Err(e) => {
                    summary.sources_skipped += 1;
                    warn!(source = label, path = %path.display(), error = %e,
                        "Skipping unreadable ontology source");
                }
            }
        }

        summary.domains_indexed = index.len();
        self.index.store(Arc::new(index));

        if let Some(path) = sources.ip_list.as_deref() {
            match read_ip_list(path) {
                Ok(ips) => {
                    summary.ips_loaded = ips.len();
                    self.ip_set.store(Arc::new(ips));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable IP list");
                }
            }
        }

        summary
    }

    /// Builds the index directly from in-memory records, source A then
    /// source B. Exact-key collisions take the later source.
    pub fn load_from_records(&self, broad: &[OntologyRecord], curated: &[OntologyRecord]) {
        let index: DomainIndex = DashMap::new();
        self.populate(&index, broad);
        self.populate(&index, curated);
        self.index.store(Arc::new(index));
    }

    /// Inserts one ontology source into the index, deduplicating by
    /// resolved company unless domain-based blocking is on.
    fn populate(&self, index: &DomainIndex, records: &[OntologyRecord]) {
        let mut shared: HashMap<CompactString, Arc<TrackerIdentity>> = HashMap::new();

        for record in records {
            let company = record.resolved_company();
            let category = if record.necessary {
                Some(NECESSARY_CATEGORY)
            } else {
                record.category.as_deref()
            };
            let rolled_up = !record.necessary && record.root_parent.is_some();

            for domain in &record.doms {
                let domain = normalize_domain(domain);
                if domain.is_empty() || ontology::is_ignored(&domain) {
                    continue;
                }

                let identity = if self.domain_based {
                    Arc::new(TrackerIdentity::per_domain(&domain, company, category))
                } else {
                    Arc::clone(shared.entry(CompactString::from(company)).or_insert_with(
                        || {
                            let identity = TrackerIdentity::new(company, category);
                            let identity = if rolled_up {
                                identity.with_source_country(record.country.as_deref())
                            } else {
                                identity.with_country(record.country.as_deref())
                            };
                            Arc::new(identity)
                        },
                    ))
                };

                index.insert(domain, identity);
            }
        }
    }

    /// Resolves a destination to a tracker identity, or `None` when the
    /// flow is not tracker traffic.
    ///
    /// Order, first match wins: exact index lookup, suffix walk over
    /// progressively shorter parent domains, merged hosts set, static IP
    /// set. Hosts-set hits are cached back into the index so repeat
    /// lookups stay O(1); IP hits are not.
    #[instrument(skip(self), level = "trace")]
    pub fn classify(&self, hostname: &str, ip: Option<&str>) -> Option<Arc<TrackerIdentity>> {
        let host = normalize_domain(hostname);
        if host.is_empty() {
            return None;
        }

        let index = self.index.load();

        if let Some(hit) = index.get(host.as_str()) {
            return Some(Arc::clone(hit.value()));
        }

        // A subdomain of a known tracker domain inherits that tracker's
        // identity; no wildcard storage needed.
        if !is_ip_literal(&host) {
            let mut rest = host.as_str();
            while let Some(dot) = rest.find('.') {
                rest = &rest[dot + 1..];
                if let Some(hit) = index.get(rest) {
                    return Some(Arc::clone(hit.value()));
                }
            }
        }

        let hosts = Arc::clone(&*self.hosts.read());
        if hosts.contains(&host) {
            if self.domain_based {
                // All hosts-list-only domains collapse to one blockable unit.
                return Some(Arc::clone(&self.hostlist));
            }
            let identity = Arc::new(TrackerIdentity::synthesised(&host));
            trace!(host = %host, "Synthesised hosts-list identity");
            index.insert(host, Arc::clone(&identity));
            return Some(identity);
        }

        let ip_candidate = ip.map(normalize_domain).filter(|s| !s.is_empty()).or_else(|| {
            is_ip_literal(&host).then(|| host.clone())
        });
        if let Some(ip) = ip_candidate {
            if self.ip_set.load().contains(ip.as_str()) {
                if self.domain_based {
                    return Some(Arc::clone(&self.hostlist));
                }
                return Some(Arc::new(TrackerIdentity::synthesised(&host)));
            }
        }

        None
    }

    /// Number of domains currently indexed, including synthesised entries.
    pub fn len(&self) -> usize {
        self.index.load().len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.load().is_empty()
    }

    /// Number of IP literals in the static set.
    pub fn ip_count(&self) -> usize {
        self.ip_set.load().len()
    }
}

impl std::fmt::Debug for TrackerDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerDirectory")
            .field("domains", &self.len())
            .field("ips", &self.ip_count())
            .field("domain_based", &self.domain_based)
            .finish()
    }
}

/// Reads the static IP blocklist: one IP literal per line, `#` comments
/// and blank lines ignored.
fn read_ip_list(path: &Path) -> Result<DashSet<CompactString>> {
    let file = File::open(path)?;
    let set = DashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        set.insert(CompactString::from(line));
    }
    Ok(set)
}
