//! Ontology asset records.
//!
//! Both bundled ontology sources share one record shape: an owning company,
//! an optional root parent, a country, a necessary-service flag, and the
//! domains the company serves from. The curated second source additionally
//! carries a category label; the broad first source does not.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// One company record from a bundled ontology asset.
#[derive(Debug, Clone, Deserialize)]
pub struct OntologyRecord {
    /// Name of the company owning the domains.
    pub owner_name: String,

    /// Ultimate parent company, when the owner is a subsidiary.
    #[serde(default)]
    pub root_parent: Option<String>,

    /// Country of the company.
    #[serde(default)]
    pub country: Option<String>,

    /// Necessary services are never rolled up to their parent and get the
    /// fixed `Content` category.
    #[serde(default)]
    pub necessary: bool,

    /// Category label; only the curated source provides one.
    #[serde(default)]
    pub category: Option<String>,

    /// Domains served by this company.
    #[serde(default)]
    pub doms: Vec<String>,
}

impl OntologyRecord {
    /// The company name this record's domains resolve to: the root parent
    /// when one exists, unless the record is a necessary service.
    pub fn resolved_company(&self) -> &str {
        if self.necessary {
            &self.owner_name
        } else {
            self.root_parent.as_deref().unwrap_or(&self.owner_name)
        }
    }
}

/// Shared-infrastructure hosts never inserted into the index by either
/// ontology source. Blocking these would break far more than tracking.
pub const IGNORED_DOMAINS: &[&str] = &[
    "akamaihd.net",
    "akamaized.net",
    "amazonaws.com",
    "cloudflare.com",
    "cloudfront.net",
    "fastly.net",
    "github.io",
    "googleapis.com",
];

/// Returns true if the (normalised) domain is on the ignore list.
pub fn is_ignored(domain: &str) -> bool {
    IGNORED_DOMAINS.contains(&domain)
}

/// Reads an ontology asset: a JSON array of [`OntologyRecord`]s.
pub fn read_records(path: &Path) -> Result<Vec<OntologyRecord>> {
    let file = File::open(path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_minimal_record() {
        let record: OntologyRecord =
            serde_json::from_str(r#"{"owner_name":"Acme","country":"US","doms":["acme.io"]}"#)
                .unwrap();
        assert_eq!(record.owner_name, "Acme");
        assert_eq!(record.country.as_deref(), Some("US"));
        assert!(!record.necessary);
        assert!(record.category.is_none());
        assert_eq!(record.doms, vec!["acme.io"]);
    }

    #[test]
    fn rollup_to_root_parent() {
        let record: OntologyRecord = serde_json::from_str(
            r#"{"owner_name":"AcmeAds","root_parent":"Acme","country":"US","doms":[]}"#,
        )
        .unwrap();
        assert_eq!(record.resolved_company(), "Acme");
    }

    #[test]
    fn necessary_keeps_own_name() {
        let record: OntologyRecord = serde_json::from_str(
            r#"{"owner_name":"AcmePush","root_parent":"Acme","country":"US","necessary":true,"doms":[]}"#,
        )
        .unwrap();
        assert_eq!(record.resolved_company(), "AcmePush");
    }

    #[test]
    fn ignore_list_contains_shared_cdns() {
        assert!(is_ignored("cloudfront.net"));
        assert!(!is_ignored("acme.io"));
    }
}
