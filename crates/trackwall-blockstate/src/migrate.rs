//! Legacy-format migration.
//!
//! Two fix-ups apply when loading persisted block state: exemption keys
//! written under a superseded company naming scheme are rewritten to the
//! current canonical names, and entries keyed by a legacy app-identifier
//! string are resolved to their current numeric uid. Both are pure,
//! in-memory fix-ups; storage is only rewritten on the next save.

use tracing::warn;

use trackwall_model::{canonical_company_name, BlockKey, KeyParseError, Uid};

/// Rewrites one persisted exemption key to the current naming scheme.
///
/// Category-only keys pass through untouched; specific-tracker keys have
/// their company component canonicalised (the same rewrite identity
/// construction applies, so migrated keys and fresh identities agree).
pub fn migrate_legacy_key(raw: &str) -> Result<BlockKey, KeyParseError> {
    let key: BlockKey = raw.parse()?;
    Ok(match key {
        BlockKey::Category(_) => key,
        BlockKey::CategoryAndName(category, name) => {
            BlockKey::category_and_name(category, canonical_company_name(&name))
        }
    })
}

/// Maps a legacy (non-numeric) app identifier to its current uid.
///
/// Implemented by the platform integration; the engine only needs the
/// best-effort lookup.
pub trait UidResolver: Send + Sync {
    /// Resolves a legacy app identifier, or `None` when the app is gone.
    fn resolve(&self, app_id: &str) -> Option<Uid>;
}

/// Resolver that knows no legacy identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl UidResolver for NoResolver {
    fn resolve(&self, _app_id: &str) -> Option<Uid> {
        None
    }
}

/// Resolves a persisted app-identifier string to a uid.
///
/// Numeric identifiers parse directly; anything else goes through the
/// resolver. Unresolvable entries are dropped with a warning rather than
/// aborting the load.
pub fn resolve_app_id(raw: &str, resolver: &dyn UidResolver) -> Option<Uid> {
    if let Ok(value) = raw.parse::<u32>() {
        return Some(Uid(value));
    }
    match resolver.resolve(raw) {
        Some(uid) => Some(uid),
        None => {
            warn!(app = raw, "Dropping block-state entry for unresolvable app identifier");
            None
        }
    }
}
