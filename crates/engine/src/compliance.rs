// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest compliance and automatic rescope.
//!
//! After a task branch exists, its changed files are checked against the
//! manifest's declared locks and file writes. Violations either warn,
//! or in block mode feed the automatic rescope: widen the declared scope
//! and re-run once, unless any offending path maps to no known resource.

use myc_policy::OwnershipIndex;
use myc_tasks::TaskManifest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    ResourceNotLockedForWrite,
    ResourceUnmapped,
    FileNotDeclaredForWrite,
}

/// One out-of-scope changed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeViolation {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub reasons: Vec<ViolationReason>,
}

/// The scope expansion automatic rescope would apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescopePlan {
    pub resources: Vec<String>,
    pub files: Vec<String>,
}

/// How the engine should proceed after a compliance check.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceOutcome {
    /// In scope, or enforcement is off.
    Clean,
    /// Violations recorded; the merge proceeds.
    Warned(Vec<ScopeViolation>),
    /// Violations gate the merge; rescope if a plan exists.
    Blocked { violations: Vec<ScopeViolation>, rescope: Option<RescopePlan> },
}

/// Compare changed files to the manifest's declared write scope.
pub fn check_compliance(
    manifest: &TaskManifest,
    changed_files: &[String],
    ownership: &OwnershipIndex,
) -> Vec<ScopeViolation> {
    let mut violations = Vec::new();
    for file in changed_files {
        let mut reasons = Vec::new();
        let resource = ownership.owner_of(file).map(str::to_string);
        match &resource {
            None => reasons.push(ViolationReason::ResourceUnmapped),
            Some(r) => {
                if !manifest.locks.writes_resource(r) {
                    reasons.push(ViolationReason::ResourceNotLockedForWrite);
                }
            }
        }
        if !file_declared_for_write(manifest, file) {
            reasons.push(ViolationReason::FileNotDeclaredForWrite);
        }
        if !reasons.is_empty() {
            violations.push(ScopeViolation { file: file.clone(), resource, reasons });
        }
    }
    violations
}

/// A declared write entry covers a file when it names it exactly or is a
/// directory prefix of it.
fn file_declared_for_write(manifest: &TaskManifest, file: &str) -> bool {
    manifest.files.writes.iter().any(|declared| {
        let declared = declared.trim_end_matches('/');
        file == declared || file.strip_prefix(declared).is_some_and(|r| r.starts_with('/'))
    })
}

/// Automatic rescope: possible iff every violation maps to a known
/// resource. Returns `None` when any path is unmapped.
pub fn plan_rescope(violations: &[ScopeViolation]) -> Option<RescopePlan> {
    if violations
        .iter()
        .any(|v| v.reasons.contains(&ViolationReason::ResourceUnmapped))
    {
        return None;
    }
    let mut plan = RescopePlan::default();
    for violation in violations {
        if let Some(resource) = &violation.resource {
            if violation.reasons.contains(&ViolationReason::ResourceNotLockedForWrite) {
                plan.resources.push(resource.clone());
            }
        }
        if violation.reasons.contains(&ViolationReason::FileNotDeclaredForWrite) {
            plan.files.push(violation.file.clone());
        }
    }
    plan.resources.sort();
    plan.resources.dedup();
    plan.files.sort();
    plan.files.dedup();
    Some(plan)
}

/// Apply the enforcement policy to a violation list.
pub fn apply_enforcement(
    mode: myc_core::ValidatorMode,
    violations: Vec<ScopeViolation>,
) -> ComplianceOutcome {
    if violations.is_empty() {
        return ComplianceOutcome::Clean;
    }
    match mode {
        myc_core::ValidatorMode::Off => ComplianceOutcome::Clean,
        myc_core::ValidatorMode::Warn => ComplianceOutcome::Warned(violations),
        myc_core::ValidatorMode::Block => {
            let rescope = plan_rescope(&violations);
            ComplianceOutcome::Blocked { violations, rescope }
        }
    }
}

#[cfg(test)]
#[path = "compliance_tests.rs"]
mod tests;
