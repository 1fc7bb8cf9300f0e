// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Approval Manager: decides whether a tool call may run, must be denied, or
//! needs to be confirmed by an operator.
//!
//! Grounded in the glob-to-regex matching idiom used elsewhere in this crate
//! for shell-command allow/deny lists, generalized to cover every
//! [`crate::tool::PermissionClass`] rather than only shell commands, and
//! extended with session-scoped memoization and a pluggable prompt protocol
//! so the interactive surface that actually renders a prompt to a human can
//! live outside this crate entirely.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::tool::PermissionClass;

/// The outcome of an approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// A single configured approval rule matching a tool name and/or an argument
/// glob pattern (e.g. a shell-command prefix).
#[derive(Debug, Clone)]
pub struct ApprovalRule {
    pub tool_name: String,
    /// Glob pattern matched against a canonicalized rendering of the call's
    /// arguments (for `run_command`, this is the command string itself).
    pub pattern: String,
    pub decision: Decision,
    /// Whether this rule was added for the lifetime of the process (`false`,
    /// loaded from config) or only for the current session via a
    /// `YesForSession` reply (`true`).
    pub session_only: bool,
}

impl ApprovalRule {
    fn matches(&self, tool_name: &str, arg_repr: &str) -> bool {
        self.tool_name == tool_name
            && glob_to_regex(&self.pattern)
                .map(|re| re.is_match(arg_repr))
                .unwrap_or(false)
    }
}

/// What is shown to an operator before a `WriteLocal`/`WriteBroad`/`Execute`/
/// `Network` tool call runs.
#[derive(Debug, Clone)]
pub struct ApprovalPreview {
    pub tool_name: String,
    pub permission_class: PermissionClass,
    pub args: Value,
}

/// An operator's reply to an [`ApprovalPreview`].
#[derive(Debug, Clone)]
pub enum PromptReply {
    Yes,
    YesForSession,
    No,
    /// Re-run the decision with edited arguments.
    Edit(Value),
    Quit,
}

/// Abstraction over however a preview actually reaches a human. The
/// interactive rendering surface is out of scope for this crate; only the
/// trait boundary lives here.
#[async_trait]
pub trait ApprovalPrompter: Send + Sync {
    async fn prompt(&self, preview: ApprovalPreview) -> PromptReply;
}

/// Always denies. Used when no operator is attached (headless/CI runs).
pub struct NonInteractivePrompter;

#[async_trait]
impl ApprovalPrompter for NonInteractivePrompter {
    async fn prompt(&self, _preview: ApprovalPreview) -> PromptReply {
        PromptReply::No
    }
}

/// Sends the preview over an `mpsc` channel and awaits a `oneshot` reply.
pub struct ChannelPrompter {
    tx: tokio::sync::mpsc::Sender<(ApprovalPreview, tokio::sync::oneshot::Sender<PromptReply>)>,
}

impl ChannelPrompter {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<(ApprovalPreview, tokio::sync::oneshot::Sender<PromptReply>)>,
    ) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ApprovalPrompter for ChannelPrompter {
    async fn prompt(&self, preview: ApprovalPreview) -> PromptReply {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        if self.tx.send((preview, reply_tx)).await.is_err() {
            return PromptReply::No;
        }
        reply_rx.await.unwrap_or(PromptReply::No)
    }
}

/// Stable signature of a tool call's canonicalized arguments, used as the
/// memoization key alongside the tool name.
fn args_signature(args: &Value) -> String {
    let canonical = canonicalize(args);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render a JSON value with object keys sorted, so semantically identical
/// argument sets hash identically regardless of field order.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// A flattened textual rendering of a call's arguments, used for glob
/// matching against `ApprovalRule::pattern` (e.g. the `command` field of a
/// `run_command` call, or the whole object for tools with no obvious single
/// string field).
fn arg_repr(args: &Value) -> String {
    args.get("command")
        .or_else(|| args.get("path"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| args.to_string())
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Implements the five-step decision function of the Approval Manager
/// contract: `ReadOnly` tools are always allowed; persistent deny rules beat
/// persistent allow rules; session-scoped `YesForSession` rules are checked
/// next; `approve_all` (a blanket `--yes`-style override) allows everything
/// remaining; anything left over falls through to the prompter.
pub struct ApprovalManager {
    persistent_rules: Vec<ApprovalRule>,
    session_rules: Vec<ApprovalRule>,
    approve_all: bool,
    memo: HashMap<(String, String), Decision>,
}

impl ApprovalManager {
    pub fn new(persistent_rules: Vec<ApprovalRule>, approve_all: bool) -> Self {
        Self {
            persistent_rules,
            session_rules: Vec::new(),
            approve_all,
            memo: HashMap::new(),
        }
    }

    /// Non-interactive decision: consults rules and memoization only. Callers
    /// needing to fall through to a human prompt should check for `None` and
    /// invoke an [`ApprovalPrompter`] themselves, then call [`Self::remember`]
    /// (or [`Self::approve_all_for_session`] for `YesForSession`) with the
    /// result.
    pub fn decide(
        &self,
        tool_name: &str,
        permission_class: PermissionClass,
        args: &Value,
    ) -> Option<Decision> {
        if permission_class == PermissionClass::ReadOnly {
            return Some(Decision::Allow);
        }

        let repr = arg_repr(args);

        for rule in &self.persistent_rules {
            if rule.decision == Decision::Deny && rule.matches(tool_name, &repr) {
                return Some(Decision::Deny);
            }
        }
        for rule in &self.persistent_rules {
            if rule.decision == Decision::Allow && rule.matches(tool_name, &repr) {
                return Some(Decision::Allow);
            }
        }
        for rule in &self.session_rules {
            if rule.matches(tool_name, &repr) {
                return Some(rule.decision);
            }
        }

        let key = (tool_name.to_string(), args_signature(args));
        if let Some(decision) = self.memo.get(&key) {
            return Some(*decision);
        }

        if self.approve_all {
            return Some(Decision::Allow);
        }

        None
    }

    /// Record a one-off decision (`Yes`/`No` reply) so the identical call
    /// (same tool, same canonical arguments) is not re-prompted this
    /// session.
    pub fn remember(&mut self, tool_name: &str, args: &Value, decision: Decision) {
        self.memo
            .insert((tool_name.to_string(), args_signature(args)), decision);
    }

    /// Record a `YesForSession` reply as a standing rule for the rest of the
    /// process lifetime, scoped to `tool_name`/`pattern` only.
    pub fn add_session_rule(&mut self, tool_name: &str, pattern: &str) {
        self.session_rules.push(ApprovalRule {
            tool_name: tool_name.to_string(),
            pattern: pattern.to_string(),
            decision: Decision::Allow,
            session_only: true,
        });
    }

    /// Flip the session-wide `approve_all` bit, making every subsequent
    /// `decide()` call return `Allow` regardless of tool or arguments (until
    /// the process exits). This is what a `PromptReply::YesForSession` reply
    /// means per the Approval Manager contract: approve everything for the
    /// rest of the session, not just the tool that was just approved.
    pub fn approve_all_for_session(&mut self) {
        self.approve_all = true;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(tool: &str, pattern: &str, decision: Decision) -> ApprovalRule {
        ApprovalRule {
            tool_name: tool.into(),
            pattern: pattern.into(),
            decision,
            session_only: false,
        }
    }

    #[test]
    fn read_only_always_allowed() {
        let mgr = ApprovalManager::new(vec![], false);
        let d = mgr.decide("read_file", PermissionClass::ReadOnly, &json!({"path": "/x"}));
        assert_eq!(d, Some(Decision::Allow));
    }

    #[test]
    fn deny_rule_beats_allow_rule_for_same_pattern() {
        let mgr = ApprovalManager::new(
            vec![
                rule("run_command", "rm *", Decision::Allow),
                rule("run_command", "rm *", Decision::Deny),
            ],
            false,
        );
        let d = mgr.decide(
            "run_command",
            PermissionClass::Execute,
            &json!({"command": "rm -rf /tmp/x"}),
        );
        assert_eq!(d, Some(Decision::Deny));
    }

    #[test]
    fn persistent_allow_rule_matches() {
        let mgr = ApprovalManager::new(
            vec![rule("run_command", "cat *", Decision::Allow)],
            false,
        );
        let d = mgr.decide(
            "run_command",
            PermissionClass::Execute,
            &json!({"command": "cat README.md"}),
        );
        assert_eq!(d, Some(Decision::Allow));
    }

    #[test]
    fn no_matching_rule_and_no_memo_falls_through() {
        let mgr = ApprovalManager::new(vec![], false);
        let d = mgr.decide(
            "run_command",
            PermissionClass::Execute,
            &json!({"command": "git push"}),
        );
        assert_eq!(d, None);
    }

    #[test]
    fn approve_all_allows_unmatched_calls() {
        let mgr = ApprovalManager::new(vec![], true);
        let d = mgr.decide(
            "write_file",
            PermissionClass::WriteLocal,
            &json!({"path": "a.txt"}),
        );
        assert_eq!(d, Some(Decision::Allow));
    }

    #[test]
    fn session_rule_applies_after_yes_for_session() {
        let mut mgr = ApprovalManager::new(vec![], false);
        assert_eq!(
            mgr.decide(
                "run_command",
                PermissionClass::Execute,
                &json!({"command": "npm install"})
            ),
            None
        );
        mgr.add_session_rule("run_command", "npm *");
        let d = mgr.decide(
            "run_command",
            PermissionClass::Execute,
            &json!({"command": "npm install"}),
        );
        assert_eq!(d, Some(Decision::Allow));
    }

    #[test]
    fn memoized_decision_is_reused_for_identical_args() {
        let mut mgr = ApprovalManager::new(vec![], false);
        let args = json!({"path": "notes.txt", "content": "hi"});
        assert_eq!(mgr.decide("write_file", PermissionClass::WriteLocal, &args), None);
        mgr.remember("write_file", &args, Decision::Allow);
        assert_eq!(
            mgr.decide("write_file", PermissionClass::WriteLocal, &args),
            Some(Decision::Allow)
        );
    }

    #[test]
    fn memoized_decision_does_not_apply_to_different_args() {
        let mut mgr = ApprovalManager::new(vec![], false);
        let args_a = json!({"path": "a.txt"});
        let args_b = json!({"path": "b.txt"});
        mgr.remember("write_file", &args_a, Decision::Allow);
        assert_eq!(
            mgr.decide("write_file", PermissionClass::WriteLocal, &args_b),
            None
        );
    }

    #[test]
    fn args_signature_is_order_independent() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(args_signature(&a), args_signature(&b));
    }

    #[test]
    fn args_signature_differs_for_different_values() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(args_signature(&a), args_signature(&b));
    }
}
