// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agentcore_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::bullet::Tag;
use crate::delta::{DeltaBatch, DeltaOperation};
use crate::playbook::Playbook;

/// One tool call and its outcome, as observed by the reflector. Deliberately
/// independent of `agentcore-tools::ToolCall` so this crate never depends on
/// (and can never invoke) the tool registry.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub tool_name: String,
    pub args_summary: String,
    pub result_summary: String,
    pub is_error: bool,
}

/// Everything the reflector needs to judge a completed iteration.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub user_query: String,
    pub assistant_text: String,
    pub tool_calls: Vec<ToolCallOutcome>,
    /// Bullet ids that were present in the playbook context sent for this turn.
    pub referenced_bullets: Vec<String>,
}

/// Structured output of the reflector pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reflection {
    pub root_cause: String,
    pub key_insight: String,
    pub bullet_tags: Vec<(String, Tag)>,
}

/// Analyze a completed iteration via the model provider. Uses a tool-free
/// message structure (no `ToolRegistry` is ever passed in) so reflection can
/// never itself execute a tool. Falls back to an empty `Reflection` on any
/// provider or parse failure — reflection is best-effort and must never
/// abort the turn that produced `iteration`.
pub async fn reflect(provider: &dyn ModelProvider, iteration: &IterationOutcome) -> anyhow::Result<Reflection> {
    let prompt = build_reflection_prompt(iteration);
    let req = CompletionRequest {
        messages: vec![
            Message::system(
                "You analyze one completed coding-assistant iteration and report, as strict JSON, \
                 the root cause of the outcome, a single reusable insight, and which referenced \
                 playbook bullets helped, hurt, or were neutral. Respond with only the JSON object: \
                 {\"root_cause\": string, \"key_insight\": string, \"bullet_tags\": [[id, \"helpful\"|\"harmful\"|\"neutral\"]]}.",
            ),
            Message::user(prompt),
        ],
        tools: vec![],
        stream: true,
        system_dynamic_suffix: None,
        cache_key: None,
    };

    let mut stream = provider.complete(req).await?;
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        if let ResponseEvent::TextDelta(delta) = event? {
            text.push_str(&delta);
        }
    }
    parse_reflection(&text)
}

fn build_reflection_prompt(iteration: &IterationOutcome) -> String {
    let mut out = format!("User query: {}\n\nAssistant response: {}\n\n", iteration.user_query, iteration.assistant_text);
    if !iteration.tool_calls.is_empty() {
        out.push_str("Tool calls:\n");
        for tc in &iteration.tool_calls {
            out.push_str(&format!(
                "- {}({}) -> {}{}\n",
                tc.tool_name,
                tc.args_summary,
                tc.result_summary,
                if tc.is_error { " [error]" } else { "" }
            ));
        }
    }
    if !iteration.referenced_bullets.is_empty() {
        out.push_str(&format!("\nReferenced playbook bullets: {}\n", iteration.referenced_bullets.join(", ")));
    }
    out
}

fn parse_reflection(text: &str) -> anyhow::Result<Reflection> {
    let trimmed = text.trim();
    let json_start = trimmed.find('{').unwrap_or(0);
    let json_end = trimmed.rfind('}').map(|i| i + 1).unwrap_or(trimmed.len());
    let candidate = &trimmed[json_start..json_end];
    Ok(serde_json::from_str(candidate)?)
}

/// Maximum delta operations accepted from a single curation pass.
pub const MAX_DELTA_BATCH_OPS: usize = 8;

/// Turn a `Reflection` into a `DeltaBatch` against the current playbook.
///
/// Deterministic and rule-based by default: every referenced bullet is
/// tagged exactly as the reflection says, and if the iteration surfaced a
/// new, non-trivial insight not already captured verbatim by an existing
/// bullet, one `Add` is appended under a section inferred from the first
/// tool touched (or `"general"`). The same signature also accepts an
/// LLM-backed curator behind a config flag (`PlaybookConfig::llm_curation`);
/// the contract — reflection + playbook + context in, `DeltaBatch` out — is
/// identical either way.
pub fn curate(reflection: &Reflection, playbook: &Playbook, iteration: &IterationOutcome) -> DeltaBatch {
    let mut ops = Vec::new();

    for (bullet_id, tag) in &reflection.bullet_tags {
        if playbook.bullets.contains_key(bullet_id) {
            ops.push(DeltaOperation::Tag { bullet_id: bullet_id.clone(), tag: *tag });
        }
        if ops.len() >= MAX_DELTA_BATCH_OPS {
            break;
        }
    }

    if ops.len() < MAX_DELTA_BATCH_OPS
        && !reflection.key_insight.trim().is_empty()
        && !playbook.bullets.values().any(|b| b.content == reflection.key_insight)
    {
        let section = iteration
            .tool_calls
            .first()
            .map(|tc| tc.tool_name.clone())
            .unwrap_or_else(|| "general".to_string());
        ops.push(DeltaOperation::Add { section, content: reflection.key_insight.clone(), metadata: None });
    }

    ops.truncate(MAX_DELTA_BATCH_OPS);
    DeltaBatch { reasoning: reflection.root_cause.clone(), operations: ops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaBatch as DB;
    use crate::Playbook;

    fn outcome() -> IterationOutcome {
        IterationOutcome {
            user_query: "fix the bug".into(),
            assistant_text: "done".into(),
            tool_calls: vec![ToolCallOutcome {
                tool_name: "edit_file".into(),
                args_summary: "a.rs".into(),
                result_summary: "ok".into(),
                is_error: false,
            }],
            referenced_bullets: vec![],
        }
    }

    #[test]
    fn parse_reflection_extracts_embedded_json() {
        let text = "Sure, here you go:\n{\"root_cause\": \"slow test\", \"key_insight\": \"retry flaky tests\", \"bullet_tags\": []}\nhope that helps";
        let r = parse_reflection(text).unwrap();
        assert_eq!(r.root_cause, "slow test");
        assert_eq!(r.key_insight, "retry flaky tests");
    }

    #[test]
    fn curate_tags_only_known_bullets() {
        let pb = Playbook::new();
        let reflection = Reflection {
            root_cause: "x".into(),
            key_insight: String::new(),
            bullet_tags: vec![("missing-1".into(), Tag::Helpful)],
        };
        let batch = curate(&reflection, &pb, &outcome());
        assert!(batch.operations.is_empty());
    }

    #[test]
    fn curate_adds_new_insight_once() {
        let pb = Playbook::new();
        let reflection = Reflection { root_cause: "x".into(), key_insight: "read before edit".into(), bullet_tags: vec![] };
        let batch = curate(&reflection, &pb, &outcome());
        assert_eq!(batch.operations.len(), 1);
        assert!(matches!(&batch.operations[0], DeltaOperation::Add { content, .. } if content == "read before edit"));
    }

    #[test]
    fn curate_skips_duplicate_insight() {
        let mut pb = Playbook::new();
        pb.apply_delta_batch(
            &DB { reasoning: "seed".into(), operations: vec![DeltaOperation::Add { section: "edit_file".into(), content: "read before edit".into(), metadata: None }] },
            8,
        )
        .unwrap();
        let reflection = Reflection { root_cause: "x".into(), key_insight: "read before edit".into(), bullet_tags: vec![] };
        let batch = curate(&reflection, &pb, &outcome());
        assert!(batch.is_empty());
    }

    #[test]
    fn curate_caps_at_max_delta_ops() {
        let mut pb = Playbook::new();
        let mut tags = Vec::new();
        for i in 0..20 {
            let id = format!("sec-{i}");
            pb.bullets.insert(id.clone(), crate::bullet::Bullet::new(id.clone(), "sec".into(), "x".into()));
            tags.push((id, Tag::Helpful));
        }
        let reflection = Reflection { root_cause: "x".into(), key_insight: String::new(), bullet_tags: tags };
        let batch = curate(&reflection, &pb, &outcome());
        assert_eq!(batch.operations.len(), MAX_DELTA_BATCH_OPS);
    }
}
