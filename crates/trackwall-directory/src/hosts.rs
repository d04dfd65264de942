//! Merged-hosts membership predicate.
//!
//! The hosts-file download/merge collaborator produces one merged hosts
//! file; this engine only needs a membership test over it. [`HostSet`] is
//! the seam, [`StaticHostSet`] the concrete reader of the merged output.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use compact_str::CompactString;
use dashmap::DashSet;
use tracing::info;

use trackwall_model::normalize_domain;

use crate::Result;

/// Membership predicate over the merged hosts blocklist.
///
/// Implementations must be safe for unsynchronised concurrent reads; the
/// classifier consults this on the packet-filtering hot path.
pub trait HostSet: Send + Sync {
    /// Returns true if the (normalised) domain is on the merged list.
    fn contains(&self, domain: &str) -> bool;

    /// Number of domains on the list.
    fn len(&self) -> usize;

    /// Returns true if the list is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A merged hosts blocklist loaded once from the collaborator's output.
#[derive(Debug, Default)]
pub struct StaticHostSet {
    domains: DashSet<CompactString>,
}

impl StaticHostSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a merged hosts file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let set = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), domains = set.len(), "Loaded merged hosts list");
        Ok(set)
    }

    /// Parses hosts-format content from a reader.
    pub fn from_reader<R: Read>(reader: BufReader<R>) -> Result<Self> {
        let set = Self::new();
        for line in reader.lines() {
            if let Some(domain) = parse_hosts_line(&line?) {
                set.insert(&domain);
            }
        }
        Ok(set)
    }

    /// Inserts a single domain.
    pub fn insert(&self, domain: &str) {
        self.domains.insert(normalize_domain(domain));
    }
}

impl HostSet for StaticHostSet {
    fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    fn len(&self) -> usize {
        self.domains.len()
    }
}

/// Parses one hosts-file line and returns the blocked domain, if any.
///
/// Accepts the usual sink addresses (`0.0.0.0`, `127.0.0.1`, `::`), skips
/// comments, localhost entries, and inline comments.
pub fn parse_hosts_line(line: &str) -> Option<CompactString> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let ip = parts.next()?;
    if !ip.starts_with("0.0.0.0") && !ip.starts_with("127.0.0.1") && !ip.starts_with("::") {
        return None;
    }

    let domain = parts.next()?;
    let domain = domain.split('#').next().unwrap_or(domain).trim();
    if domain.is_empty()
        || domain == "localhost"
        || domain == "localhost.localdomain"
        || domain == "local"
    {
        return None;
    }

    Some(normalize_domain(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sink_addresses() {
        assert_eq!(
            parse_hosts_line("0.0.0.0 ads.example.com").as_deref(),
            Some("ads.example.com")
        );
        assert_eq!(
            parse_hosts_line("127.0.0.1 Tracking.Example.COM").as_deref(),
            Some("tracking.example.com")
        );
        assert_eq!(
            parse_hosts_line(":: metrics.example.net").as_deref(),
            Some("metrics.example.net")
        );
    }

    #[test]
    fn skips_comments_and_localhost() {
        assert!(parse_hosts_line("# comment").is_none());
        assert!(parse_hosts_line("").is_none());
        assert!(parse_hosts_line("127.0.0.1 localhost").is_none());
        assert!(parse_hosts_line("1.2.3.4 example.com").is_none());
    }

    #[test]
    fn strips_inline_comments() {
        assert_eq!(
            parse_hosts_line("0.0.0.0 ads.example.com # annoying").as_deref(),
            Some("ads.example.com")
        );
    }

    #[test]
    fn static_set_membership() {
        let content = "0.0.0.0 ads.example.com\n# comment\n127.0.0.1 localhost\n0.0.0.0 t.example.net\n";
        let set = StaticHostSet::from_reader(BufReader::new(content.as_bytes())).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("ads.example.com"));
        assert!(set.contains("t.example.net"));
        assert!(!set.contains("example.org"));
    }
}
