// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn branch_name_slugs_the_task_name() {
    assert_eq!(
        build_task_branch_name("mycelium/", "12", "Fix Login Flow!"),
        "mycelium/12-fix-login-flow"
    );
}

#[test]
fn branch_name_truncates_long_names() {
    let name = "a very long task name that keeps going and going and going forever";
    let branch = build_task_branch_name("t/", "3", name);
    assert!(branch.len() <= 2 + 1 + 1 + 40 + 1, "branch was {branch}");
    assert!(branch.starts_with("t/3-a-very-long"));
}

#[test]
fn name_status_takes_rename_destination() {
    let out = "M\tsrc/lib.rs\nR100\tsrc/old.rs\tsrc/new.rs\nA\tdocs/readme.md\n";
    assert_eq!(
        parse_name_status(out),
        vec!["src/lib.rs", "src/new.rs", "docs/readme.md"]
    );
}

#[test]
fn name_status_ignores_blank_lines() {
    assert!(parse_name_status("\n\n").is_empty());
}

#[test]
fn porcelain_handles_renames_and_untracked() {
    let out = " M src/lib.rs\nR  src/old.rs -> src/new.rs\n?? notes.txt\n";
    assert_eq!(
        parse_porcelain(out),
        vec!["src/lib.rs", "src/new.rs", "notes.txt"]
    );
}

#[test]
fn paths_are_forward_slashed() {
    let out = "M\tsrc\\win\\path.rs\n";
    assert_eq!(parse_name_status(out), vec!["src/win/path.rs"]);
}

#[test]
fn quoted_paths_are_unwrapped() {
    let out = "?? \"weird name.txt\"\n";
    assert_eq!(parse_porcelain(out), vec!["weird name.txt"]);
}

#[test]
fn merge_outcome_clean_check() {
    let clean = MergeOutcome {
        merged: vec!["a".into()],
        conflicts: vec![],
        merge_commit: "abc".into(),
    };
    assert!(clean.is_clean());
    let conflicted = MergeOutcome {
        merged: vec![],
        conflicts: vec!["b".into()],
        merge_commit: "abc".into(),
    };
    assert!(!conflicted.is_clean());
}
