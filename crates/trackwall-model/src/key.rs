//! Per-app block keys.
//!
//! Block state is keyed either by a bare category or by a category plus a
//! specific tracker name. The persisted form is the historical
//! `"<category> | <name>"` string; [`BlockKey`] keeps the two variants
//! distinct in the type system and round-trips that format exactly.

use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::TrackerIdentity;

/// Separator used by the persisted key format.
const SEPARATOR: &str = " | ";

/// Error parsing a persisted block key.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyParseError {
    /// The key string was empty.
    #[error("empty block key")]
    Empty,

    /// The key contained more than one separator.
    #[error("malformed block key: {0:?}")]
    Malformed(String),
}

/// A key into a uid's exemption set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKey {
    /// A whole category of trackers.
    Category(CompactString),

    /// One specific tracker within a category.
    CategoryAndName(CompactString, CompactString),
}

impl BlockKey {
    /// Creates a category key.
    pub fn category(category: impl Into<CompactString>) -> Self {
        Self::Category(category.into())
    }

    /// Creates a specific-tracker key.
    pub fn category_and_name(
        category: impl Into<CompactString>,
        name: impl Into<CompactString>,
    ) -> Self {
        Self::CategoryAndName(category.into(), name.into())
    }

    /// The two keys the decision evaluator consults for an identity:
    /// the category key and the specific `category | name` key.
    pub fn for_identity(identity: &TrackerIdentity) -> (Self, Self) {
        (
            Self::category(identity.category()),
            Self::category_and_name(identity.category(), identity.name()),
        )
    }

    /// The category component, present in both variants.
    pub fn category_part(&self) -> &str {
        match self {
            Self::Category(c) => c,
            Self::CategoryAndName(c, _) => c,
        }
    }

    /// The tracker-name component, if this is a specific key.
    pub fn name_part(&self) -> Option<&str> {
        match self {
            Self::Category(_) => None,
            Self::CategoryAndName(_, n) => Some(n),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(c) => write!(f, "{c}"),
            Self::CategoryAndName(c, n) => write!(f, "{c}{SEPARATOR}{n}"),
        }
    }
}

impl FromStr for BlockKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        match s.split_once(SEPARATOR) {
            None => Ok(Self::category(s)),
            Some((category, name)) => {
                if name.contains(SEPARATOR) {
                    return Err(KeyParseError::Malformed(s.to_string()));
                }
                Ok(Self::category_and_name(category.trim(), name.trim()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UNCATEGORISED;

    #[test]
    fn display_round_trip() {
        let cat = BlockKey::category("Advertising");
        assert_eq!(cat.to_string(), "Advertising");
        assert_eq!(cat.to_string().parse::<BlockKey>().unwrap(), cat);

        let specific = BlockKey::category_and_name("Advertising", "Acme");
        assert_eq!(specific.to_string(), "Advertising | Acme");
        assert_eq!(specific.to_string().parse::<BlockKey>().unwrap(), specific);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!("".parse::<BlockKey>(), Err(KeyParseError::Empty));
        assert_eq!("   ".parse::<BlockKey>(), Err(KeyParseError::Empty));
        assert!(matches!(
            "a | b | c".parse::<BlockKey>(),
            Err(KeyParseError::Malformed(_))
        ));
    }

    #[test]
    fn keys_for_identity() {
        let identity = TrackerIdentity::new("Acme", None);
        let (category, specific) = BlockKey::for_identity(&identity);
        assert_eq!(category, BlockKey::category(UNCATEGORISED));
        assert_eq!(
            specific,
            BlockKey::category_and_name(UNCATEGORISED, "Acme")
        );
    }

    #[test]
    fn component_accessors() {
        let specific = BlockKey::category_and_name("Social", "Facebook");
        assert_eq!(specific.category_part(), "Social");
        assert_eq!(specific.name_part(), Some("Facebook"));
        assert_eq!(BlockKey::category("Social").name_part(), None);
    }
}
