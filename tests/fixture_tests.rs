//! End-to-end fixture tests.
//!
//! Each fixture holds a pipeline configuration, a table of unlinked spots
//! tagged with an `id` column, and the expected partition of those ids into
//! trajectories. Labels themselves are arbitrary, so only the partition is
//! compared.
//!
//! Run with: cargo test fixture

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use trajlink::{SpotRecord, TrackingConfig, Trajectories};

// ============================================================================
// Fixture JSON Schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct Fixture {
    description: String,
    config: TrackingConfig,
    spots: Vec<SpotRecord>,
    expected_segments: Vec<Vec<usize>>,
}

// ============================================================================
// Test Helpers
// ============================================================================

fn find_testdata_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("testdata/fixtures"),
        PathBuf::from("../testdata/fixtures"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/fixtures"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.clone();
        }
    }
    panic!("Could not find testdata/fixtures directory");
}

fn load_fixture(scenario: &str) -> Fixture {
    let path = find_testdata_dir().join(format!("fixture_{}.json", scenario));

    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture file {:?}: {}", path, e));

    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture file {:?}: {}", path, e))
}

/// Spot ids grouped by label, every group sorted, groups sorted.
fn partition(trajs: &Trajectories) -> Vec<Vec<usize>> {
    let ids = trajs.column("id").expect("id column");
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (key, id) in trajs.index().iter().zip(ids) {
        groups.entry(key.label).or_default().push(id as usize);
    }

    let mut groups: Vec<Vec<usize>> = groups
        .into_values()
        .map(|mut group| {
            group.sort();
            group
        })
        .collect();
    groups.sort();
    groups
}

fn run_fixture_test(scenario: &str) {
    let fixture = load_fixture(scenario);
    let n_spots = fixture.spots.len();

    let trajs = Trajectories::from_records(fixture.spots).expect("valid spots");
    let trajs = fixture.config.run(trajs).expect("pipeline runs");

    assert_eq!(trajs.len(), n_spots, "{}: spots were lost", fixture.description);

    let mut expected: Vec<Vec<usize>> = fixture
        .expected_segments
        .into_iter()
        .map(|mut group| {
            group.sort();
            group
        })
        .collect();
    expected.sort();

    assert_eq!(partition(&trajs), expected, "{}", fixture.description);
}

// ============================================================================
// Test Cases
// ============================================================================

#[test]
fn test_fixture_three_lines() {
    run_fixture_test("three_lines");
}

#[test]
fn test_fixture_gap() {
    run_fixture_test("gap");
}

#[test]
fn test_fixture_merge() {
    run_fixture_test("merge");
}
