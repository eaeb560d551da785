// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn component(name: &str, roots: &[&str]) -> Component {
    Component { name: name.into(), roots: roots.iter().map(|r| r.to_string()).collect() }
}

#[test]
fn ownership_longest_root_wins() {
    let index = OwnershipIndex::build(&[
        component("platform", &["apps"]),
        component("web", &["apps/web"]),
    ]);
    assert_eq!(index.owner_of("apps/web/src/x.ts"), Some("web"));
    assert_eq!(index.owner_of("apps/api/src/y.ts"), Some("platform"));
    assert_eq!(index.owner_of("docs/readme.md"), None);
}

#[test]
fn ownership_requires_component_boundary() {
    let index = OwnershipIndex::build(&[component("web", &["apps/web"])]);
    // `apps/webby` shares a prefix but is not inside `apps/web`.
    assert_eq!(index.owner_of("apps/webby/x.ts"), None);
    assert_eq!(index.owner_of("apps/web"), Some("web"));
}

#[test]
fn dedupe_by_from_to_kind() {
    let graph = DepGraph {
        edges: vec![
            DepEdge {
                from_component: "b".into(),
                to_component: "a".into(),
                kind: "import".into(),
                confidence: Confidence::High,
            },
            DepEdge {
                from_component: "b".into(),
                to_component: "a".into(),
                kind: "import".into(),
                confidence: Confidence::Low,
            },
            DepEdge {
                from_component: "b".into(),
                to_component: "a".into(),
                kind: "build".into(),
                confidence: Confidence::High,
            },
        ],
    }
    .deduped();
    assert_eq!(graph.edges.len(), 2);
    // First occurrence wins, so the high-confidence import survives.
    assert_eq!(graph.edges[0].confidence, Confidence::High);
}

#[test]
fn reverse_index_groups_by_target() {
    let graph = DepGraph {
        edges: vec![
            DepEdge {
                from_component: "b".into(),
                to_component: "a".into(),
                kind: "import".into(),
                confidence: Confidence::High,
            },
            DepEdge {
                from_component: "c".into(),
                to_component: "a".into(),
                kind: "import".into(),
                confidence: Confidence::High,
            },
        ],
    };
    let index = graph.reverse_index();
    assert_eq!(index.get("a").map(Vec::len), Some(2));
    assert!(index.get("b").is_none());
}

#[test]
fn model_round_trips_and_dedupes_on_construction() {
    let model = ControlPlaneModel::new(
        vec![component("a", &["apps/a"])],
        Some(DepGraph {
            edges: vec![
                DepEdge {
                    from_component: "b".into(),
                    to_component: "a".into(),
                    kind: "import".into(),
                    confidence: Confidence::High,
                },
                DepEdge {
                    from_component: "b".into(),
                    to_component: "a".into(),
                    kind: "import".into(),
                    confidence: Confidence::High,
                },
            ],
        }),
    );
    assert_eq!(model.deps.as_ref().map(|d| d.edges.len()), Some(1));
    let json = serde_json::to_string(&model).unwrap();
    let back: ControlPlaneModel = serde_json::from_str(&json).unwrap();
    assert_eq!(back, model);
}
