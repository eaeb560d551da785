// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slugify strings for branch names and log directories.

/// Slugify a string for use in a branch name or directory component.
///
/// Lowercases, replaces any run of non-alphanumeric characters with a single
/// hyphen, collapses duplicates, and truncates to `max_len` at a word
/// boundary (trimming trailing hyphens). Unlike display names, branch slugs
/// keep every word so `buildTaskBranchName` output stays predictable.
pub fn slugify(input: &str, max_len: usize) -> String {
    let lower = input.to_lowercase();

    let mut slug = String::with_capacity(lower.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    let mut result = slug.trim_end_matches('-').to_string();

    if result.len() > max_len {
        if let Some(pos) = result[..max_len].rfind('-') {
            result.truncate(pos);
        } else {
            result.truncate(max_len);
        }
        while result.ends_with('-') {
            result.pop();
        }
    }

    result
}

#[cfg(test)]
#[path = "slug_tests.rs"]
mod tests;
