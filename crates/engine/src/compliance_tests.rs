// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use myc_core::ValidatorMode;
use myc_policy::Component;

fn ownership() -> OwnershipIndex {
    OwnershipIndex::build(&[
        Component { name: "auth".into(), roots: vec!["services/auth".into()] },
        Component { name: "billing".into(), roots: vec!["services/billing".into()] },
    ])
}

fn manifest(lock_writes: &[&str], file_writes: &[&str]) -> TaskManifest {
    let json = serde_json::json!({
        "id": "7",
        "name": "change auth",
        "estimated_minutes": 10,
        "locks": { "writes": lock_writes },
        "files": { "writes": file_writes },
        "verify": { "doctor": "true" }
    });
    TaskManifest::parse(std::path::Path::new("manifest.json"), &json.to_string()).unwrap()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn in_scope_change_is_clean() {
    let m = manifest(&["auth"], &["services/auth"]);
    let violations = check_compliance(&m, &strings(&["services/auth/src/login.rs"]), &ownership());
    assert!(violations.is_empty());
}

#[test]
fn undeclared_resource_write_is_flagged() {
    let m = manifest(&["auth"], &["services/auth", "services/billing"]);
    let violations =
        check_compliance(&m, &strings(&["services/billing/src/invoice.rs"]), &ownership());
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].resource.as_deref(), Some("billing"));
    assert_eq!(violations[0].reasons, vec![ViolationReason::ResourceNotLockedForWrite]);
}

#[test]
fn unmapped_path_is_flagged() {
    let m = manifest(&["auth"], &["services/auth"]);
    let violations = check_compliance(&m, &strings(&["tools/script.sh"]), &ownership());
    assert!(violations[0].reasons.contains(&ViolationReason::ResourceUnmapped));
    assert!(violations[0].reasons.contains(&ViolationReason::FileNotDeclaredForWrite));
}

#[test]
fn undeclared_file_in_locked_resource_is_flagged() {
    let m = manifest(&["auth"], &["services/auth/src/login.rs"]);
    let violations =
        check_compliance(&m, &strings(&["services/auth/src/token.rs"]), &ownership());
    assert_eq!(violations[0].reasons, vec![ViolationReason::FileNotDeclaredForWrite]);
}

#[test]
fn rescope_plan_widens_resources_and_files() {
    let m = manifest(&["auth"], &["services/auth"]);
    let violations =
        check_compliance(&m, &strings(&["services/billing/src/invoice.rs"]), &ownership());
    let plan = plan_rescope(&violations).unwrap();
    assert_eq!(plan.resources, vec!["billing"]);
    assert_eq!(plan.files, vec!["services/billing/src/invoice.rs"]);

    let widened = m.rescoped(&plan.resources, &plan.files);
    assert!(check_compliance(&widened, &strings(&["services/billing/src/invoice.rs"]), &ownership())
        .is_empty());
}

#[test]
fn rescope_impossible_with_unmapped_path() {
    let m = manifest(&["auth"], &["services/auth"]);
    let violations = check_compliance(
        &m,
        &strings(&["services/billing/src/invoice.rs", "tools/script.sh"]),
        &ownership(),
    );
    assert!(plan_rescope(&violations).is_none());
}

#[test]
fn enforcement_modes_map_to_outcomes() {
    let m = manifest(&["auth"], &["services/auth"]);
    let violations =
        check_compliance(&m, &strings(&["services/billing/src/invoice.rs"]), &ownership());

    assert_eq!(
        apply_enforcement(ValidatorMode::Off, violations.clone()),
        ComplianceOutcome::Clean
    );
    assert!(matches!(
        apply_enforcement(ValidatorMode::Warn, violations.clone()),
        ComplianceOutcome::Warned(_)
    ));
    match apply_enforcement(ValidatorMode::Block, violations) {
        ComplianceOutcome::Blocked { rescope, .. } => assert!(rescope.is_some()),
        other => panic!("expected block, got {other:?}"),
    }
}

#[test]
fn directory_declarations_cover_children_not_siblings() {
    let m = manifest(&["auth"], &["services/auth"]);
    assert!(check_compliance(&m, &strings(&["services/auth/deep/nested.rs"]), &ownership())
        .is_empty());
    let violations = check_compliance(&m, &strings(&["services/authx/file.rs"]), &ownership());
    assert!(!violations.is_empty());
}
