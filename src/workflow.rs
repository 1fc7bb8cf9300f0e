// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Minimal Markdown step splitter for `--file`.
//!
//! Trimmed to what this core needs: an ordered list of step bodies. Per-step
//! `mode=... model=...` frontmatter directives belong to the excluded
//! workflow-runner surface and are not parsed here.

/// Split `input` into step bodies on top-level `## ` headings. A heading's
/// own text becomes part of its step body (it usually carries useful
/// context for the model); content before the first heading is its own
/// leading step only if non-blank. A file with no `## ` heading is a single
/// step.
pub fn split_steps(input: &str) -> Vec<String> {
    let mut steps = Vec::new();
    let mut current = String::new();

    for line in input.lines() {
        if line.starts_with("## ") && !current.trim().is_empty() {
            steps.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        steps.push(current);
    }

    steps.into_iter().map(|s| s.trim().to_string()).collect()
}
