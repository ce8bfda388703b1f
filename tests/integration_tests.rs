//! Integration tests for trajectory linking and gap closing.
//!
//! These tests run complete workflows across the table, matrix and solver
//! modules.

use std::sync::Once;

use nalgebra::DMatrix;

use trajlink::{
    ByFrameSolver, CostMatrix, DiagBlock, Error, GapCloseSolver, InDecision, LinkBlock,
    OutDecision, ProgressBar, Solver, SpotKey, SpotRecord, TrackingConfig, Trajectories,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Spots `(t_stamp, label, x, y)` with `t = t_stamp`.
fn make_trajs(spots: &[(i64, i64, f64, f64)]) -> Trajectories {
    let rows = spots
        .iter()
        .map(|&(t, label, x, y)| (SpotKey::new(t, label), vec![t as f64, x, y]))
        .collect();
    Trajectories::new(&["t", "x", "y"], rows).expect("valid table")
}

/// Straight lines `y = offset`, `x = x0 + speed * t`, every spot with its own label.
fn unlinked_lines(lines: &[(f64, f64, f64)], frames: std::ops::Range<i64>) -> Trajectories {
    let mut spots = Vec::new();
    let mut label = 0;
    for t in frames {
        // Reverse order per frame so labels never follow the lines
        for &(x0, speed, offset) in lines.iter().rev() {
            spots.push((t, label, x0 + speed * t as f64, offset));
            label += 1;
        }
    }
    make_trajs(&spots)
}

/// Labels of the spots at the given `y`, in time order.
fn labels_at_y(trajs: &Trajectories, y: f64) -> Vec<i64> {
    trajs
        .index()
        .iter()
        .filter(|k| trajs.get(k, "y").unwrap() == y)
        .map(|k| k.label)
        .collect()
}

fn n_links(trajs: &Trajectories) -> usize {
    trajs.len() - trajs.labels().len()
}

// =============================================================================
// Round trip: three straight lines
// =============================================================================

#[test]
fn test_integration_three_straight_lines() {
    init_tracing();
    let lines = [(0.0, 1.0, 0.0), (0.0, 1.0, 20.0), (5.0, -0.5, 40.0)];
    let trajs = unlinked_lines(&lines, 0..10);
    assert_eq!(trajs.labels().len(), 30);

    let mut solver = ByFrameSolver::for_brownian_motion(trajs, 2.0, None, &["x", "y"]).unwrap();
    let trajs = solver.track().unwrap();

    assert_eq!(trajs.labels().len(), 3);
    for &(_, _, y) in &lines {
        let labels = labels_at_y(trajs, y);
        assert_eq!(labels.len(), 10);
        assert!(labels.iter().all(|&l| l == labels[0]), "line y={} split: {:?}", y, labels);
    }
}

#[test]
fn test_integration_deterministic() {
    let lines = [(0.0, 1.0, 0.0), (0.0, 1.2, 1.5), (3.0, 0.0, 3.0)];
    let trajs = unlinked_lines(&lines, 0..8);

    let run = |trajs: Trajectories| {
        let mut solver = ByFrameSolver::for_brownian_motion(trajs, 3.0, None, &["x", "y"]).unwrap();
        solver.track().unwrap();
        solver.into_trajs()
    };
    assert_eq!(run(trajs.clone()), run(trajs));
}

// =============================================================================
// Gap closing
// =============================================================================

fn broken_line() -> Trajectories {
    // Constant velocity 1 along x, detections missing at frames 3 and 4
    make_trajs(&[
        (0, 0, 0.0, 0.0),
        (1, 0, 1.0, 0.0),
        (2, 0, 2.0, 0.0),
        (5, 1, 5.0, 0.0),
        (6, 1, 6.0, 0.0),
        (7, 1, 7.0, 0.0),
    ])
}

#[test]
fn test_integration_gap_closure_within_maximum_gap() {
    init_tracing();
    let mut solver = GapCloseSolver::for_constant_velocity(broken_line(), 5, None, &["x", "y"]).unwrap();
    let trajs = solver.track().unwrap();

    assert_eq!(trajs.labels(), vec![0]);
    assert_eq!(trajs.len(), 6);
}

#[test]
fn test_integration_gap_too_long() {
    let mut solver = GapCloseSolver::for_constant_velocity(broken_line(), 2, None, &["x", "y"]).unwrap();
    let trajs = solver.track().unwrap();

    assert_eq!(trajs, &broken_line());
}

#[test]
fn test_integration_merge_scenario() {
    // Segments 0 and 1 both end at t=4 close to where segment 2 starts
    let trajs = make_trajs(&[
        (0, 0, 0.0, 0.0),
        (1, 0, 1.0, 0.0),
        (2, 0, 2.0, 0.0),
        (3, 0, 3.0, 0.0),
        (4, 0, 4.0, 0.0),
        (0, 1, 0.0, 0.5),
        (1, 1, 1.0, 0.5),
        (2, 1, 2.0, 0.5),
        (3, 1, 3.0, 0.5),
        (4, 1, 4.0, 0.5),
        (6, 2, 6.0, 0.0),
        (7, 2, 7.0, 0.0),
    ]);
    let mut solver = GapCloseSolver::for_constant_velocity(trajs, 3, None, &["x", "y"]).unwrap();
    let trajs = solver.track().unwrap();

    // Segment 2 joins exactly one leaving segment, the other one ends
    assert_eq!(trajs.labels(), vec![0, 1]);
    assert_eq!(trajs.get_bounds()[&0], (0, 7));
    assert_eq!(trajs.get_bounds()[&1], (0, 4));
}

#[test]
fn test_integration_no_candidates_is_noop() {
    let trajs = make_trajs(&[(0, 3, 0.0, 0.0), (1, 3, 1.0, 0.0), (1, 8, 9.0, 9.0)]);
    let mut solver = GapCloseSolver::for_constant_velocity(trajs.clone(), 4, None, &["x", "y"]).unwrap();
    assert_eq!(solver.track().unwrap(), &trajs);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_integration_monotone_acceptance() {
    // Well separated lines moving at 0.3, 1.5 and 4 per frame
    let lines = [(0.0, 0.3, 0.0), (0.0, 1.5, 1000.0), (0.0, 4.0, 2000.0)];
    let trajs = unlinked_lines(&lines, 0..6);

    let mut previous = 0;
    for max_speed in [0.0, 0.5, 2.0, 5.0, 50.0] {
        let mut solver = ByFrameSolver::for_brownian_motion(trajs.clone(), max_speed, Some(100.0), &["x", "y"]).unwrap();
        let links = n_links(solver.track().unwrap());
        assert!(links >= previous, "max_speed {} accepted {} < {}", max_speed, links, previous);
        previous = links;
    }
    assert_eq!(previous, 15);
}

#[test]
fn test_integration_assignment_completeness() {
    let nan = f64::NAN;
    let link = DMatrix::from_row_slice(3, 2, &[
        1.0, 8.0,
        nan, 2.0,
        0.5, nan,
    ]);
    let keys_out: Vec<SpotKey> = (0..3).map(|l| SpotKey::new(0, l)).collect();
    let keys_in: Vec<SpotKey> = (0..2).map(|l| SpotKey::new(1, l)).collect();

    let link = LinkBlock::from_parts(keys_out.clone(), keys_in.clone(), link).unwrap();
    let death = DiagBlock::from_costs(keys_out, &[3.0, 3.0, 3.0]).unwrap();
    let birth = DiagBlock::from_costs(keys_in, &[3.0, 3.0]).unwrap();
    let mut cost_matrix = CostMatrix::new(&link, &death, &birth).unwrap();
    let total = cost_matrix.solve().unwrap();

    let mut cols = cost_matrix.out_links().unwrap();
    cols.sort();
    assert_eq!(cols, (0..5).collect::<Vec<_>>());
    let mut rows = cost_matrix.in_links().unwrap();
    rows.sort();
    assert_eq!(rows, (0..5).collect::<Vec<_>>());

    // Doing nothing costs every death plus every birth
    assert!(total <= 15.0);

    let (outs, ins) = cost_matrix.decisions().unwrap();
    let linked_out: Vec<usize> = outs
        .iter()
        .filter_map(|d| match d {
            OutDecision::Link(j) => Some(*j),
            OutDecision::Death => None,
        })
        .collect();
    let linked_in = ins.iter().filter(|d| matches!(d, InDecision::Link(_))).count();
    assert_eq!(linked_out.len(), linked_in);
    // Never two leaving spots on one entering spot
    let mut unique = linked_out.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), linked_out.len());
}

#[test]
fn test_integration_keys_stay_unique() {
    let lines = [(0.0, 1.0, 0.0), (0.5, 1.0, 0.6), (0.0, 0.0, 1.2)];
    let mut trajs = unlinked_lines(&lines, 0..6);
    trajs.remove_spots(&[SpotKey::new(2, 6), SpotKey::new(3, 9)]).unwrap();

    let config = TrackingConfig::from_json_str(
        r#"{"by_frame": {"max_speed": 2.0, "coords": ["x", "y"]},
            "gap_close": {"maximum_gap": 3, "coords": ["x", "y"]}}"#,
    )
    .unwrap();
    let trajs = config.run(trajs).unwrap();

    assert!(trajs.index().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(trajs.len(), 16);
}

// =============================================================================
// Pipeline and surfaces
// =============================================================================

#[test]
fn test_integration_pipeline_from_records() {
    init_tracing();
    let records: Vec<SpotRecord> = serde_json::from_str(
        r#"[
            {"t_stamp": 0, "label": 10, "t": 0.0, "x": 0.0, "y": 0.0},
            {"t_stamp": 1, "label": 11, "t": 1.0, "x": 1.0, "y": 0.0},
            {"t_stamp": 2, "label": 12, "t": 2.0, "x": 2.0, "y": 0.0},
            {"t_stamp": 5, "label": 13, "t": 5.0, "x": 5.0, "y": 0.0},
            {"t_stamp": 6, "label": 14, "t": 6.0, "x": 6.0, "y": 0.0}
        ]"#,
    )
    .unwrap();
    let trajs = Trajectories::from_records(records).unwrap();

    let config = TrackingConfig::from_json_str(
        r#"{"by_frame": {"max_speed": 1.5, "penalty": 5.0, "coords": ["x", "y"]},
            "gap_close": {"maximum_gap": 5, "coords": ["x", "y"]}}"#,
    )
    .unwrap();
    let mut trajs = config.run(trajs).unwrap();
    trajs.relabel_fromzero().unwrap();

    assert_eq!(trajs.labels(), vec![0]);
    let json = serde_json::to_string(&trajs.to_records()).unwrap();
    assert!(json.contains("\"label\":0"));
}

#[test]
fn test_integration_empty_pipeline() {
    let config = TrackingConfig::from_json_str(r#"{}"#).unwrap();
    let trajs = broken_line();
    assert_eq!(config.run(trajs.clone()).unwrap(), trajs);
}

#[test]
fn test_integration_structure_errors() {
    let trajs = Trajectories::new(&["t", "x"], vec![(SpotKey::new(0, 0), vec![0.0, 0.0])]).unwrap();

    match ByFrameSolver::for_brownian_motion(trajs.clone(), 1.0, None, &["x", "y"]) {
        Err(Error::MissingColumns(missing)) => assert_eq!(missing, vec!["y".to_string()]),
        other => panic!("expected missing columns, got {:?}", other.map(|_| ())),
    }

    let mut renamed = trajs;
    renamed.set_index_names(&["frame", "label"]);
    assert!(matches!(
        GapCloseSolver::for_constant_velocity(renamed, 3, None, &["x"]),
        Err(Error::MissingIndex(_))
    ));
}

#[test]
fn test_integration_progress_bar_does_not_change_result() {
    let lines = [(0.0, 1.0, 0.0), (0.0, 1.0, 20.0)];
    let trajs = unlinked_lines(&lines, 0..5);

    let mut plain = ByFrameSolver::for_brownian_motion(trajs.clone(), 2.0, None, &["x", "y"]).unwrap();
    plain.track().unwrap();

    // Clones share state with the bar handed to the solver
    let bar = ProgressBar::hidden().unwrap();
    let mut with_bar = ByFrameSolver::for_brownian_motion(trajs, 2.0, None, &["x", "y"])
        .unwrap()
        .with_progress(Box::new(bar.clone()));
    with_bar.track().unwrap();

    assert_eq!(plain.trajs(), with_bar.trajs());
    assert_eq!(bar.position(), 100);
    assert_eq!(bar.message(), "t_out:3|t_in:4");
    assert!(bar.is_finished());
}
