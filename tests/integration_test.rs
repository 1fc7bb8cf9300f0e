// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Integration tests exercising the Agent loop, config defaults, approval
/// manager, and builtin tools together using the mock model provider.
use std::sync::Arc;

use agentcore_config::{AgentConfig, AgentMode, Config, ToolsConfig};
use agentcore_core::{Agent, AgentEvent, AgentRuntimeContext};
use agentcore_model::{Message, MockProvider, Role};
use agentcore_tools::{
    events::ToolEvent, ApprovalManager, ApprovalRule, Decision, ReadFileTool, RunTerminalCommandTool, Tool,
    ToolCall, ToolRegistry, WriteTool,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

fn mock_agent(mode: AgentMode) -> Agent {
    let model: Arc<dyn agentcore_model::ModelProvider> = Arc::new(MockProvider);
    let tools = Arc::new(ToolRegistry::default());
    let config = Arc::new(AgentConfig::default());
    let mode_lock = Arc::new(Mutex::new(mode));
    let (_tx, tool_event_rx) = mpsc::channel::<ToolEvent>(64);
    Agent::new(
        model,
        tools,
        config,
        AgentRuntimeContext::default(),
        mode_lock,
        tool_event_rx,
        128_000,
    )
}

#[tokio::test]
async fn agent_returns_mock_response() {
    let mut agent = mock_agent(AgentMode::Agent);
    let (tx, mut rx) = mpsc::channel(64);
    agent.submit("hello", tx).await.unwrap();

    let mut got_text = false;
    while let Some(event) = rx.recv().await {
        if let AgentEvent::TextDelta(t) = event {
            assert!(t.contains("MOCK"));
            got_text = true;
        }
    }
    assert!(got_text, "expected at least one TextDelta event");
}

#[tokio::test]
async fn agent_round_trips_history_through_the_session() {
    let mut agent = mock_agent(AgentMode::Agent);
    let (tx, rx) = mpsc::channel(64);
    agent.submit("what is two plus two", tx).await.unwrap();
    drop(rx);

    let msgs = &agent.session().messages;
    assert_eq!(msgs[0].role, Role::System);
    let user = msgs.iter().find(|m| m.role == Role::User).unwrap();
    assert_eq!(user.as_text(), Some("what is two plus two"));
    let assistant = msgs.iter().find(|m| m.role == Role::Assistant).unwrap();
    assert!(assistant.as_text().unwrap().contains("MOCK"));
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.model.provider, "openai");
    assert!(cfg.agent.max_tool_rounds > 0);
    assert!(cfg.agent.compaction_threshold > 0.0);
    assert!(cfg.agent.reflection_window > 0);
}

#[test]
fn approval_manager_auto_allows_from_config_patterns() {
    let cfg = ToolsConfig::default();
    let rules: Vec<ApprovalRule> = cfg
        .auto_approve_patterns
        .iter()
        .map(|p| ApprovalRule {
            tool_name: "run_terminal_command".into(),
            pattern: p.clone(),
            decision: Decision::Allow,
            session_only: false,
        })
        .collect();
    let mgr = ApprovalManager::new(rules, false);

    let decision = mgr.decide(
        "run_terminal_command",
        agentcore_tools::PermissionClass::Execute,
        &serde_json::json!("cat /etc/hosts"),
    );
    assert_eq!(decision, Some(Decision::Allow));
}

#[test]
fn approval_manager_deny_rule_wins_over_approve_all() {
    let rules = vec![ApprovalRule {
        tool_name: "run_terminal_command".into(),
        pattern: "rm -rf /*".into(),
        decision: Decision::Deny,
        session_only: false,
    }];
    let mgr = ApprovalManager::new(rules, true);

    let decision = mgr.decide(
        "run_terminal_command",
        agentcore_tools::PermissionClass::Execute,
        &serde_json::json!("rm -rf /*"),
    );
    assert_eq!(decision, Some(Decision::Deny));
}

#[tokio::test]
async fn run_terminal_command_tool_executes_echo() {
    let tool = RunTerminalCommandTool::default();
    let call = ToolCall {
        id: "1".into(),
        name: "run_terminal_command".into(),
        args: serde_json::json!({ "command": "echo hello_world" }),
    };
    let output = tool.execute(&call, &CancellationToken::new()).await;
    assert!(!output.is_error);
    assert!(output.content.contains("hello_world"));
}

#[tokio::test]
async fn fs_tool_write_read_roundtrip() {
    let path = format!("/tmp/agentcore_test_{}.txt", uuid::Uuid::new_v4());

    let write_call = ToolCall {
        id: "w1".into(),
        name: "write_file".into(),
        args: serde_json::json!({ "path": path, "content": "roundtrip" }),
    };
    let wo = WriteTool.execute(&write_call, &CancellationToken::new()).await;
    assert!(!wo.is_error, "write failed: {}", wo.content);

    let read_call = ToolCall {
        id: "r1".into(),
        name: "read_file".into(),
        args: serde_json::json!({ "path": path }),
    };
    let ro = ReadFileTool.execute(&read_call, &CancellationToken::new()).await;
    assert!(!ro.is_error);
    assert!(ro.content.contains("roundtrip"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn conversation_history_survives_a_second_turn() {
    let mut agent = mock_agent(AgentMode::Agent);
    let (tx1, rx1) = mpsc::channel(64);
    agent.submit("first question", tx1).await.unwrap();
    drop(rx1);

    let (tx2, rx2) = mpsc::channel(64);
    agent.submit("second question", tx2).await.unwrap();
    drop(rx2);

    let user_texts: Vec<&str> = agent
        .session()
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .filter_map(|m| m.as_text())
        .collect();
    assert_eq!(user_texts, vec!["first question", "second question"]);
}

#[test]
fn message_constructors_round_trip_role_and_text() {
    let m = Message::user("hi there");
    assert_eq!(m.role, Role::User);
    assert_eq!(m.as_text(), Some("hi there"));
}
