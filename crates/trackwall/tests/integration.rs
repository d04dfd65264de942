//! Full-stack integration tests for the Trackwall engine.
//!
//! These tests exercise the complete path the VPN service uses: load the
//! bundled assets from disk, classify destinations, mutate per-app block
//! state, and evaluate verdicts, including the persisted-state and
//! legacy-migration paths.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use trackwall_blockstate::{BlockState, JsonSettingsStore, NoResolver, SettingsStore};
use trackwall_directory::{DirectoryOptions, DirectorySources, StaticHostSet, TrackerDirectory};
use trackwall_engine::TrackerEngine;
use trackwall_model::{BlockKey, Uid, Verdict, UNCATEGORISED};

// ============================================================================
// Test Helpers
// ============================================================================

struct Fixture {
    dir: tempfile::TempDir,
    sources: DirectorySources,
}

/// Writes the two ontology sources and the IP list the way the bundled
/// assets ship.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();

    let companies = serde_json::json!([
        {"owner_name": "Acme", "country": "US", "doms": ["acme.io", "acme-cdn.net"]},
        {"owner_name": "AcmeAds", "root_parent": "Acme", "country": "US", "doms": ["acmeads.net"]},
        {"owner_name": "Alphabet", "country": "US", "doms": ["doubleclick.net"]},
        {"owner_name": "Umbrella", "country": "GB", "doms": ["umbrella.example"]}
    ]);
    let categories = serde_json::json!([
        {"owner_name": "Umbrella", "country": "GB", "category": "Advertising",
         "doms": ["umbrella.example"]}
    ]);

    let companies_path = dir.path().join("companies.json");
    let categories_path = dir.path().join("categories.json");
    let ip_path = dir.path().join("ip_blocklist.txt");
    fs::write(&companies_path, companies.to_string()).unwrap();
    fs::write(&categories_path, categories.to_string()).unwrap();
    fs::write(&ip_path, "# known tracking endpoints\n203.0.113.7\n").unwrap();

    Fixture {
        dir,
        sources: DirectorySources {
            companies: Some(companies_path),
            categories: Some(categories_path),
            ip_list: Some(ip_path),
        },
    }
}

fn engine(options: DirectoryOptions, sources: &DirectorySources) -> TrackerEngine {
    let directory = Arc::new(TrackerDirectory::new(options));
    directory.load(sources);
    TrackerEngine::new(directory, Arc::new(BlockState::new()))
}

// ============================================================================
// Directory + Classifier
// ============================================================================

#[test]
fn richer_source_wins_shared_domains() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);

    // Both sources define umbrella.example; the curated category wins.
    let id = engine.classify("umbrella.example", None).unwrap();
    assert_eq!(id.category(), "Advertising");

    // Domains only source A knows keep its (uncategorised) metadata.
    let id = engine.classify("acme.io", None).unwrap();
    assert_eq!(id.category(), UNCATEGORISED);
}

#[test]
fn subdomains_inherit_ancestor_identity() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);

    let ancestor = engine.classify("doubleclick.net", None).unwrap();
    let sub = engine.classify("stats.g.doubleclick.net", None).unwrap();
    assert_eq!(ancestor, sub);
    // Canonicalisation applies across the rollup.
    assert_eq!(ancestor.name(), "Google");
}

#[test]
fn granularity_switch_changes_identity_names() {
    let fixture = fixture();

    let company_level = engine(DirectoryOptions::default(), &fixture.sources);
    let a = company_level.classify("acme.io", None).unwrap();
    let b = company_level.classify("acme-cdn.net", None).unwrap();
    assert_eq!(a.name(), b.name());

    let domain_level = engine(
        DirectoryOptions {
            domain_based_blocking: true,
        },
        &fixture.sources,
    );
    let a = domain_level.classify("acme.io", None).unwrap();
    let b = domain_level.classify("acme-cdn.net", None).unwrap();
    assert_ne!(a.name(), b.name());
    assert!(a.name().contains("Acme"));
    assert!(b.name().contains("Acme"));
}

#[test]
fn concurrent_hosts_list_classification_is_idempotent() {
    let fixture = fixture();
    let engine = Arc::new(engine(DirectoryOptions::default(), &fixture.sources));
    let hosts = StaticHostSet::new();
    hosts.insert("sneaky.example");
    engine.directory().set_hosts(Arc::new(hosts));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.classify("sneaky.example", None).unwrap())
        })
        .collect();

    let first = engine.classify("sneaky.example", None).unwrap();
    for handle in handles {
        let id = handle.join().unwrap();
        assert_eq!(id.name(), first.name());
        assert_eq!(id.category(), first.category());
    }
}

#[test]
fn ip_only_match_is_blockable() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);

    let decision = engine.evaluate(Uid(7), "edge.example", Some("203.0.113.7"));
    assert!(decision.identity.unwrap().is_uncertain());
    assert_eq!(decision.verdict, Verdict::Block);

    let decision = engine.evaluate(Uid(7), "edge.example", Some("198.51.100.1"));
    assert!(decision.identity.is_none());
    assert_eq!(decision.verdict, Verdict::Allow);
}

// ============================================================================
// Decision Precedence
// ============================================================================

#[test]
fn default_deny_for_unmutated_uid() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let uid = Uid(31337);

    let identity = engine.classify("acme.io", None).unwrap();
    assert_eq!(engine.decide(uid, Some(&identity)), Verdict::Block);
    assert_eq!(engine.decide(uid, None), Verdict::Allow);
}

#[test]
fn category_exemption_beats_specific_state() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let uid = Uid(100);
    engine
        .block_state()
        .exempt(uid, BlockKey::category("Advertising"));

    // Every tracker in the category is allowed, whatever its name.
    let id = engine.classify("umbrella.example", None).unwrap();
    assert_eq!(engine.decide(uid, Some(&id)), Verdict::Allow);
}

#[test]
fn specific_exemption_allows_one_tracker_only() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let uid = Uid(101);
    engine
        .block_state()
        .exempt(uid, BlockKey::category_and_name(UNCATEGORISED, "Acme"));

    let acme = engine.classify("acme.io", None).unwrap();
    let google = engine.classify("doubleclick.net", None).unwrap();
    assert_eq!(engine.decide(uid, Some(&acme)), Verdict::Allow);
    assert_eq!(engine.decide(uid, Some(&google)), Verdict::Block);
}

#[test]
fn end_to_end_acme_scenario() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let uid = Uid(42);

    let identity = engine.classify("cdn.acme.io", None).unwrap();
    assert_eq!(identity.name(), "Acme");
    assert_eq!(identity.category(), UNCATEGORISED);

    assert_eq!(engine.decide(uid, Some(&identity)), Verdict::Block);

    engine
        .block_state()
        .exempt(uid, BlockKey::category_and_name(UNCATEGORISED, "Acme"));
    assert_eq!(engine.decide(uid, Some(&identity)), Verdict::Allow);
}

#[test]
fn block_state_mutations_visible_without_directory_reload() {
    let fixture = fixture();
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let uid = Uid(55);
    let id = engine.classify("acme.io", None).unwrap();

    assert_eq!(engine.decide(uid, Some(&id)), Verdict::Block);
    engine.block_state().exempt(uid, BlockKey::category(UNCATEGORISED));
    assert_eq!(engine.decide(uid, Some(&id)), Verdict::Allow);
    engine.block_state().unexempt(uid, &BlockKey::category(UNCATEGORISED));
    assert_eq!(engine.decide(uid, Some(&id)), Verdict::Block);
}

// ============================================================================
// Persistence & Migration
// ============================================================================

#[test]
fn persisted_state_round_trips_across_sessions() {
    let fixture = fixture();
    let state_path = fixture.dir.path().join("blockstate.json");
    let store = JsonSettingsStore::new(&state_path);

    {
        let engine = engine(DirectoryOptions::default(), &fixture.sources);
        let state = engine.block_state();
        state.exempt(Uid(42), BlockKey::category_and_name(UNCATEGORISED, "Acme"));
        state.set_app_routed(Uid(42), false);
        state.block_internet(Uid(99));
        state.persist(&store).unwrap();
    }

    // Next session: a fresh engine loads the same store.
    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    engine
        .block_state()
        .load_from(&store, &NoResolver)
        .unwrap();

    let id = engine.classify("cdn.acme.io", None).unwrap();
    assert_eq!(engine.decide(Uid(42), Some(&id)), Verdict::Allow);
    assert!(!engine.block_state().is_app_routed(Uid(42)));
    assert!(engine.block_state().is_internet_blocked(Uid(99)));
}

#[test]
fn legacy_keys_migrate_to_canonical_names_on_load() {
    let fixture = fixture();
    let state_path: PathBuf = fixture.dir.path().join("blockstate.json");
    fs::write(
        &state_path,
        serde_json::json!({
            "exemptions": { "42": ["Uncategorised | Alphabet"] }
        })
        .to_string(),
    )
    .unwrap();

    let engine = engine(DirectoryOptions::default(), &fixture.sources);
    let store = JsonSettingsStore::new(&state_path);
    engine
        .block_state()
        .load_from(&store, &NoResolver)
        .unwrap();

    // The migrated key matches the canonicalised identity from the
    // directory, so the old exemption still applies.
    let id = engine.classify("doubleclick.net", None).unwrap();
    assert_eq!(id.name(), "Google");
    assert_eq!(engine.decide(Uid(42), Some(&id)), Verdict::Allow);

    // Saving writes the canonical form.
    engine.block_state().persist(&store).unwrap();
    let saved = store.load().unwrap();
    assert_eq!(saved.exemptions["42"], vec!["Uncategorised | Google".to_string()]);
}
