// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Environment detection for [`agentcore_core::AgentRuntimeContext`]: project
//! root, git metadata, CI metadata, and a project instructions file.

use std::path::{Path, PathBuf};
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(3);
const GIT_OUTPUT_LIMIT: usize = 4096;
const MAX_CONTEXT_FILE_BYTES: usize = 16 * 1024;

/// Walk up from the current directory looking for `.git`. Falls back to the
/// canonicalized current directory if no repository is found.
pub fn find_project_root() -> anyhow::Result<PathBuf> {
    let start = std::env::current_dir()?;
    let mut current = start.as_path();
    loop {
        if current.join(".git").exists() {
            return Ok(std::fs::canonicalize(current)?);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(std::fs::canonicalize(&start)?)
}

/// Run a git command in `dir` with a hard timeout; `None` on any failure.
fn run_git_timed(args: &[&str], dir: &Path) -> Option<String> {
    use std::sync::mpsc;

    let dir = dir.to_path_buf();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = std::process::Command::new("git")
            .args(&args)
            .current_dir(&dir)
            .output();
        let _ = tx.send(result);
    });

    let output = rx.recv_timeout(GIT_TIMEOUT).ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout[..output.stdout.len().min(GIT_OUTPUT_LIMIT)]);
    let s = raw.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Formatted `## Git Context` block for the system prompt, or `None` when
/// `project_root` is not a git repository.
pub fn git_context_note(project_root: &Path) -> Option<String> {
    let branch = run_git_timed(&["rev-parse", "--abbrev-ref", "HEAD"], project_root);
    let commit = run_git_timed(&["rev-parse", "--short", "HEAD"], project_root);
    if branch.is_none() && commit.is_none() {
        return None;
    }
    let remote_url = run_git_timed(&["remote", "get-url", "origin"], project_root);
    let dirty_count = run_git_timed(&["status", "--porcelain"], project_root)
        .map(|s| s.lines().count())
        .unwrap_or(0);

    let mut lines = vec!["## Git Context".to_string()];
    if let Some(b) = &branch {
        lines.push(format!("Branch: {b}"));
    }
    if let Some(c) = &commit {
        lines.push(format!("Commit: {c}"));
    }
    if let Some(r) = &remote_url {
        lines.push(format!("Remote: {r}"));
    }
    if dirty_count > 0 {
        lines.push(format!("Uncommitted changes: {dirty_count} file(s)"));
    } else if commit.is_some() {
        lines.push("Working tree: clean".to_string());
    }
    Some(lines.join("\n"))
}

/// Load the first of `.agentcore/context.md`, `AGENTS.md`, `CLAUDE.md` found
/// under `project_root`, truncated to [`MAX_CONTEXT_FILE_BYTES`].
pub fn load_project_context_file(project_root: &Path) -> Option<String> {
    let candidates = [
        project_root.join(".agentcore").join("context.md"),
        project_root.join("AGENTS.md"),
        project_root.join("CLAUDE.md"),
    ];

    for path in &candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        let (content, truncated) = if bytes.len() > MAX_CONTEXT_FILE_BYTES {
            let safe = &bytes[..MAX_CONTEXT_FILE_BYTES];
            (String::from_utf8_lossy(safe).trim_end().to_string(), true)
        } else {
            (String::from_utf8_lossy(&bytes).trim().to_string(), false)
        };
        if content.is_empty() {
            continue;
        }
        return Some(if truncated {
            format!("{content}\n\n*(Context file truncated at {MAX_CONTEXT_FILE_BYTES} bytes)*")
        } else {
            content
        });
    }
    None
}

/// Formatted `## CI Environment` block, detected from well-known env vars.
/// `None` outside of CI.
pub fn ci_context_note() -> Option<String> {
    let provider;
    let mut repo = None;
    let mut branch = None;
    let mut commit = None;
    let mut pr_number = None;

    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        provider = "GitHub Actions";
        repo = std::env::var("GITHUB_REPOSITORY").ok();
        branch = std::env::var("GITHUB_REF_NAME").ok();
        commit = std::env::var("GITHUB_SHA").ok();
        pr_number = std::env::var("GITHUB_EVENT_NUMBER")
            .ok()
            .or_else(|| std::env::var("PR_NUMBER").ok());
    } else if std::env::var("GITLAB_CI").as_deref() == Ok("true") {
        provider = "GitLab CI";
        repo = std::env::var("CI_PROJECT_PATH").ok();
        branch = std::env::var("CI_COMMIT_REF_NAME").ok();
        commit = std::env::var("CI_COMMIT_SHA").ok();
        pr_number = std::env::var("CI_MERGE_REQUEST_IID").ok();
    } else if std::env::var("CI").as_deref() == Ok("true") {
        provider = "CI";
        branch = std::env::var("BRANCH_NAME")
            .ok()
            .or_else(|| std::env::var("GIT_BRANCH").ok());
        commit = std::env::var("GIT_COMMIT").ok();
    } else {
        return None;
    }

    let mut lines = vec!["## CI Environment".to_string(), format!("Running in: {provider}")];
    if let Some(r) = &repo {
        lines.push(format!("Repository: {r}"));
    }
    if let Some(b) = &branch {
        lines.push(format!("Branch: {b}"));
    }
    if let Some(c) = &commit {
        lines.push(format!("Commit: {}", &c[..c.len().min(12)]));
    }
    if let Some(pr) = &pr_number {
        lines.push(format!("PR/MR: #{pr}"));
    }
    Some(lines.join("\n"))
}
