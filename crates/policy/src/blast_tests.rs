// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{Component, DepEdge, DepGraph};

fn model(components: &[(&str, &str)], edges: &[(&str, &str, Confidence)]) -> ControlPlaneModel {
    let components = components
        .iter()
        .map(|(name, root)| Component { name: name.to_string(), roots: vec![root.to_string()] })
        .collect();
    let deps = DepGraph {
        edges: edges
            .iter()
            .map(|(from, to, confidence)| DepEdge {
                from_component: from.to_string(),
                to_component: to.to_string(),
                kind: "import".into(),
                confidence: *confidence,
            })
            .collect(),
    };
    ControlPlaneModel::new(components, Some(deps))
}

fn files(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn impacted_is_reverse_reachable_set_on_high_edges() {
    // c depends on b depends on a; change a and everything upstream is in.
    let m = model(
        &[("a", "apps/a"), ("b", "apps/b"), ("c", "apps/c")],
        &[("b", "a", Confidence::High), ("c", "b", Confidence::High)],
    );
    let blast = BlastRadius::compute(&m, &files(&["apps/a/src/x.ts"]));
    assert_eq!(blast.touched_components, vec!["a"]);
    assert_eq!(blast.impacted_components, vec!["a", "b", "c"]);
    assert_eq!(blast.confidence, Confidence::High);
    assert!(blast.widening_reasons.is_empty());
}

#[test]
fn low_confidence_edge_widens_to_all_components() {
    // Seeded scenario: components a,b,c; single edge b→a (low).
    let m = model(
        &[("a", "apps/a"), ("b", "apps/b"), ("c", "apps/c")],
        &[("b", "a", Confidence::Low)],
    );
    let blast = BlastRadius::compute(&m, &files(&["apps/a/src/x.ts"]));
    assert_eq!(blast.touched_components, vec!["a"]);
    assert_eq!(blast.impacted_components, vec!["a", "b", "c"]);
    assert_eq!(blast.confidence, Confidence::Low);
    assert_eq!(blast.widening_reasons, vec![REASON_LOW_CONFIDENCE_EDGES]);
}

#[test]
fn missing_dep_graph_downgrades_to_medium() {
    let mut m = model(&[("a", "apps/a")], &[]);
    m.deps = None;
    let blast = BlastRadius::compute(&m, &files(&["apps/a/src/x.ts"]));
    assert_eq!(blast.confidence, Confidence::Medium);
    assert_eq!(blast.widening_reasons, vec![REASON_MISSING_DEP_GRAPH]);
    assert_eq!(blast.impacted_components, vec!["a"]);
}

#[test]
fn unmapped_paths_warn_and_downgrade() {
    let m = model(&[("a", "apps/a")], &[]);
    let blast = BlastRadius::compute(&m, &files(&["apps/a/src/x.ts", "scripts/tool.sh"]));
    assert_eq!(blast.unmapped_paths, vec!["scripts/tool.sh"]);
    assert!(blast.widening_reasons.contains(&REASON_UNMAPPED_PATHS.to_string()));
    assert_eq!(blast.confidence, Confidence::Medium);
}

#[test]
fn impacted_always_superset_of_touched() {
    let m = model(
        &[("a", "apps/a"), ("b", "apps/b")],
        &[("a", "b", Confidence::High)],
    );
    // Change b: a depends on b so a is impacted; touched ⊆ impacted.
    let blast = BlastRadius::compute(&m, &files(&["apps/b/y.ts"]));
    for touched in &blast.touched_components {
        assert!(blast.impacted_components.contains(touched));
    }
    assert_eq!(blast.impacted_components, vec!["a", "b"]);
}

#[test]
fn cyclic_graph_terminates() {
    let m = model(
        &[("a", "apps/a"), ("b", "apps/b")],
        &[("a", "b", Confidence::High), ("b", "a", Confidence::High)],
    );
    let blast = BlastRadius::compute(&m, &files(&["apps/a/x.ts"]));
    assert_eq!(blast.impacted_components, vec!["a", "b"]);
    assert_eq!(blast.confidence, Confidence::High);
}

#[test]
fn no_changes_means_empty_radius() {
    let m = model(&[("a", "apps/a")], &[]);
    let blast = BlastRadius::compute(&m, &[]);
    assert!(blast.touched_components.is_empty());
    assert!(blast.impacted_components.is_empty());
    assert_eq!(blast.confidence, Confidence::High);
}
