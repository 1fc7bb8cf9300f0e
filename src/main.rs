// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod context;
mod workflow;

use std::io::{self, IsTerminal, Read, Write};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use agentcore_core::{Agent, AgentEvent, AgentRuntimeContext};
use agentcore_session::{SessionDocument, SessionStore};
use agentcore_tools::{
    events::TodoItem, ApprovalManager, ApprovalPreview, ApprovalPrompter, ApprovalRule, Decision,
    NonInteractivePrompter, PromptReply,
};

use cli::{Cli, Commands, OutputFormatArg};

const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_AGENT_ERROR: i32 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(cmd) = &cli.command {
        return run_command(cmd, &cli).await;
    }

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("[agentcore:error] {e:#}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

async fn run_command(cmd: &Commands, cli: &Cli) -> anyhow::Result<()> {
    match cmd {
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            Ok(())
        }
        Commands::ShowConfig => {
            let config = agentcore_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Sessions { limit } => print_sessions(*limit),
        Commands::ListModels { provider, refresh, json } => {
            let config = agentcore_config::load(cli.config.as_deref())?;
            list_models_cmd(&config, provider.as_deref(), *refresh, *json).await
        }
        Commands::ListProviders { verbose, json } => list_providers_cmd(*verbose, *json),
    }
}

// ─── Main headless run ───────────────────────────────────────────────────────

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = agentcore_config::load(cli.config.as_deref())?;

    let working_dir = cli.working_dir.clone().or_else(|| context::find_project_root().ok());

    let model_cfg = match &cli.model {
        Some(m) => agentcore_model::resolve_model_from_config(&config, m),
        None => config.model.clone(),
    };
    let model: Arc<dyn agentcore_model::ModelProvider> =
        Arc::from(agentcore_model::from_config(&model_cfg).context("constructing model provider")?);
    let max_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;

    let todos = Arc::new(Mutex::new(Vec::<TodoItem>::new()));
    let (tool_event_tx, tool_event_rx) = mpsc::channel(32);
    let tools = Arc::new(agentcore_tools::build_tool_registry(&config, todos, tool_event_tx));

    let mut agent_config = config.agent.clone();
    if let Some(n) = cli.max_iterations {
        agent_config.max_tool_rounds = n as u32;
    }

    let runtime = AgentRuntimeContext {
        project_root: working_dir.clone(),
        git_context_note: working_dir.as_deref().and_then(context::git_context_note),
        ci_context_note: context::ci_context_note(),
        project_context_file: working_dir.as_deref().and_then(context::load_project_context_file),
        append_system_prompt: None,
        system_prompt_override: None,
    };

    let mode_lock = Arc::new(Mutex::new(cli.mode));
    let (approval, prompter) = build_approval(&config.tools, cli.approve_all);

    let mut agent = Agent::with_playbook_config(
        model,
        tools,
        Arc::new(agent_config),
        Arc::new(config.playbook.clone()),
        runtime,
        mode_lock,
        tool_event_rx,
        max_tokens,
    )
    .with_approval(approval, prompter);

    let store = SessionStore::discover().ok();
    let mut created_at = chrono::Utc::now();
    if let Some(store) = &store {
        let loaded = if cli.resume_continue {
            store.load_latest().ok()
        } else if let Some(id) = &cli.resume {
            Some(store.load(id).with_context(|| format!("resuming session '{id}'"))?)
        } else {
            None
        };
        if let Some(doc) = loaded {
            created_at = doc.created_at;
            *agent.session_mut() = doc.into_session();
        }
    }

    let steps = collect_steps(&cli)?;
    if steps.is_empty() {
        return run_interactive(&mut agent, cli.output_format).await;
    }

    let mut json_steps = Vec::new();
    let mut exit_code = 0;
    for (idx, step) in steps.iter().enumerate() {
        let success = run_step(&mut agent, step, cli.output_format, idx, &mut json_steps).await?;
        if let Some(store) = &store {
            let doc = SessionDocument::from_session(agent.session(), working_dir.clone(), created_at);
            if let Err(e) = store.save(&doc) {
                tracing::warn!(error = %e, "failed to persist session");
            }
        }
        if !success {
            exit_code = EXIT_AGENT_ERROR;
            break;
        }
    }

    if cli.output_format == OutputFormatArg::Json {
        println!("{}", serde_json::to_string_pretty(&json_steps)?);
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Determine the ordered list of user-turn inputs for this run: `--file`
/// (split into Markdown steps), else `--prompt`, else piped stdin read as a
/// single turn. An empty result means "start an interactive loop instead".
fn collect_steps(cli: &Cli) -> anyhow::Result<Vec<String>> {
    if let Some(path) = &cli.file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading workflow file {}", path.display()))?;
        return Ok(workflow::split_steps(&content));
    }
    if let Some(prompt) = &cli.prompt {
        return Ok(vec![prompt.clone()]);
    }
    if cli.stdin_is_piped() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        if buf.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![buf]);
    }
    Ok(Vec::new())
}

/// Read one line at a time from an interactive terminal and submit each as
/// its own turn, until EOF (Ctrl-D) or a blank line.
async fn run_interactive(agent: &mut Agent, output_format: OutputFormatArg) -> anyhow::Result<()> {
    let mut json_steps = Vec::new();
    let mut idx = 0usize;
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        let n = io::stdin().read_line(&mut line).context("reading stdin")?;
        if n == 0 || line.trim().is_empty() {
            break;
        }
        run_step(agent, line.trim(), output_format, idx, &mut json_steps).await?;
        idx += 1;
    }
    if output_format == OutputFormatArg::Json {
        println!("{}", serde_json::to_string_pretty(&json_steps)?);
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct JsonStep {
    index: usize,
    user_input: String,
    agent_response: String,
    tools_used: Vec<String>,
    success: bool,
}

/// Submit one turn, stream its events to stdout/stderr per `output_format`,
/// and append a [`JsonStep`] record. Returns `false` on a reported agent error.
async fn run_step(
    agent: &mut Agent,
    input: &str,
    output_format: OutputFormatArg,
    index: usize,
    json_steps: &mut Vec<JsonStep>,
) -> anyhow::Result<bool> {
    let (tx, mut rx) = mpsc::channel(64);
    let render = tokio::spawn(async move {
        let mut response = String::new();
        let mut tools_used = Vec::new();
        let mut failed = false;
        while let Some(event) = rx.recv().await {
            handle_event(event, output_format, &mut response, &mut tools_used, &mut failed);
        }
        (response, tools_used, failed)
    });

    if output_format == OutputFormatArg::Conversation {
        println!("## User\n\n{input}\n");
    }

    agent.submit(input, tx).await?;
    let (response, tools_used, failed) =
        render.await.unwrap_or_else(|_| (String::new(), Vec::new(), false));

    match output_format {
        OutputFormatArg::Conversation => {
            println!("## Agent\n\n{response}\n");
        }
        OutputFormatArg::Compact => {
            println!("{response}");
        }
        OutputFormatArg::Json => {}
    }

    json_steps.push(JsonStep {
        index,
        user_input: input.to_string(),
        agent_response: response,
        tools_used,
        success: !failed,
    });

    Ok(!failed)
}

/// Write diagnostics to stderr and accumulate the final response text.
/// Grounded in the teacher's CI runner event handler, trimmed to the events
/// this core's agent loop actually emits.
fn handle_event(
    event: AgentEvent,
    output_format: OutputFormatArg,
    response: &mut String,
    tools_used: &mut Vec<String>,
    failed: &mut bool,
) {
    match event {
        AgentEvent::TextDelta(delta) => response.push_str(&delta),
        AgentEvent::TextComplete(_) => {}
        AgentEvent::ThinkingDelta(_) => {}
        AgentEvent::ThinkingComplete(content) => {
            eprintln!("[agentcore:thinking] {content}");
        }
        AgentEvent::ToolCallStarted(tc) => {
            eprintln!(
                "[agentcore:tool:call] id=\"{}\" name=\"{}\" args={}",
                tc.id,
                tc.name,
                serde_json::to_string(&tc.args).unwrap_or_default()
            );
            tools_used.push(tc.name.clone());
            if output_format == OutputFormatArg::Conversation {
                println!("## Tool: {}\n\n```json\n{}\n```\n", tc.name, tc.args);
            }
        }
        AgentEvent::ToolCallFinished { call_id, tool_name, output, is_error } => {
            eprintln!(
                "[agentcore:tool:result] id=\"{call_id}\" name=\"{tool_name}\" success={} size={}",
                !is_error,
                output.len()
            );
            if output_format == OutputFormatArg::Conversation {
                println!("## Tool Result: {tool_name}\n\n```\n{output}\n```\n");
            }
        }
        AgentEvent::ContextCompacted { tokens_before, tokens_after, strategy, turn } => {
            eprintln!(
                "[agentcore:context:compacted] turn={turn} strategy={strategy:?} {tokens_before} -> {tokens_after} tokens"
            );
        }
        AgentEvent::TokenUsage { input, output, cache_read, cache_write, .. } => {
            if cache_read > 0 || cache_write > 0 {
                eprintln!(
                    "[agentcore:tokens] input={input} output={output} cache_read={cache_read} cache_write={cache_write}"
                );
            } else {
                eprintln!("[agentcore:tokens] input={input} output={output}");
            }
        }
        AgentEvent::TodoUpdate(todos) => {
            let lines: Vec<String> = todos
                .iter()
                .map(|t| format!("  [{}] {}: {}", t.id, t.status, t.content))
                .collect();
            eprintln!("[agentcore:todos]\n{}", lines.join("\n"));
        }
        AgentEvent::Error(msg) => {
            eprintln!("[agentcore:agent:error] {msg}");
            *failed = true;
        }
        AgentEvent::Aborted { partial_text } => {
            response.push_str(&partial_text);
            eprintln!("[agentcore:aborted]");
        }
        AgentEvent::TurnComplete => {}
        AgentEvent::StateChanged(state) => {
            tracing::debug!(?state, "agent state changed");
        }
    }
}

// ─── Approval wiring ──────────────────────────────────────────────────────────

/// Build the [`ApprovalManager`] from `tools.auto_approve_patterns` /
/// `deny_patterns` (matched against `run_terminal_command` invocations) plus
/// the `--approve-all` flag, and pick a prompter appropriate to the terminal:
/// an interactive stdin prompt when attached to a real TTY, otherwise a
/// prompter that always denies (headless/CI runs have no one to ask).
fn build_approval(
    tools: &agentcore_config::ToolsConfig,
    approve_all: bool,
) -> (ApprovalManager, Arc<dyn ApprovalPrompter>) {
    let mut rules = Vec::new();
    for pattern in &tools.auto_approve_patterns {
        rules.push(ApprovalRule {
            tool_name: "run_terminal_command".to_string(),
            pattern: pattern.clone(),
            decision: Decision::Allow,
            session_only: false,
        });
    }
    for pattern in &tools.deny_patterns {
        rules.push(ApprovalRule {
            tool_name: "run_terminal_command".to_string(),
            pattern: pattern.clone(),
            decision: Decision::Deny,
            session_only: false,
        });
    }

    let manager = ApprovalManager::new(rules, approve_all);
    let prompter: Arc<dyn ApprovalPrompter> = if io::stdin().is_terminal() {
        Arc::new(StdinPrompter)
    } else {
        Arc::new(NonInteractivePrompter)
    };
    (manager, prompter)
}

/// Renders an [`ApprovalPreview`] to stderr and reads a one-line reply from
/// stdin. Accepts `y`/`yes`, `a`/`always` (approve for the rest of this
/// session), anything else denies.
struct StdinPrompter;

#[async_trait]
impl ApprovalPrompter for StdinPrompter {
    async fn prompt(&self, preview: ApprovalPreview) -> PromptReply {
        eprintln!(
            "\n[agentcore:approval] {} ({:?})\n  {}",
            preview.tool_name, preview.permission_class, preview.args
        );
        eprint!("Allow this call? [y/N/a=always this session] ");
        io::stderr().flush().ok();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return PromptReply::No;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => PromptReply::Yes,
            "a" | "always" => PromptReply::YesForSession,
            "q" | "quit" => PromptReply::Quit,
            _ => PromptReply::No,
        }
    }
}

// ─── Subcommands ──────────────────────────────────────────────────────────────

fn print_sessions(limit: usize) -> anyhow::Result<()> {
    let store = SessionStore::discover().context("locating session store")?;
    let rows = store.list(limit)?;
    if rows.is_empty() {
        println!("No saved sessions found.");
        return Ok(());
    }
    println!("{:<38}  {:<20}  {:<6}  DIRECTORY", "ID", "UPDATED", "TURNS");
    println!("{}", "-".repeat(90));
    for row in &rows {
        let dir = row
            .working_directory
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38}  {:<20}  {:<6}  {}",
            row.id,
            row.updated_at.format("%Y-%m-%d %H:%M:%S"),
            row.message_count,
            dir
        );
    }
    println!("\nTotal: {} session(s)", rows.len());
    Ok(())
}

async fn list_models_cmd(
    config: &agentcore_config::Config,
    provider_filter: Option<&str>,
    refresh: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    if let Some(prov) = provider_filter {
        if agentcore_model::get_driver(prov).is_none() {
            eprintln!("Unknown provider: {prov:?}");
            eprintln!("\nAvailable providers (run `agentcore list-providers` for details):");
            for d in agentcore_model::list_drivers() {
                eprintln!("  {:20} {}", d.id, d.name);
            }
            anyhow::bail!("Invalid provider: {prov}");
        }
    }

    let entries = if refresh {
        let model_cfg = if let Some(prov) = provider_filter {
            let mut c = config.model.clone();
            c.provider = prov.to_string();
            c
        } else {
            config.model.clone()
        };
        let model = agentcore_model::from_config(&model_cfg)?;
        let mut live = model.list_models().await?;
        if let Some(prov) = provider_filter {
            live.retain(|e| e.provider == prov);
        }
        live
    } else {
        let mut all = agentcore_model::catalog::static_catalog();
        if let Some(prov) = provider_filter {
            all.retain(|e| e.provider == prov);
        }
        all.sort_by(|a, b| a.provider.cmp(&b.provider).then(a.id.cmp(&b.id)));
        all
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    let id_w = entries.iter().map(|e| e.id.len()).max().unwrap_or(10).max(10);
    let prov_w = entries.iter().map(|e| e.provider.len()).max().unwrap_or(8).max(8);

    println!(
        "{:<id_w$}  {:<prov_w$}  {:>12}  {:>16}  DESCRIPTION",
        "ID", "PROVIDER", "CTX WINDOW", "MAX OUT TOKENS",
        id_w = id_w, prov_w = prov_w,
    );
    println!("{}", "-".repeat(id_w + prov_w + 50));
    for e in &entries {
        let ctx = if e.context_window == 0 { "  -".to_string() } else { format!("{:>12}", e.context_window) };
        let max_out = if e.max_output_tokens == 0 { "  -".to_string() } else { format!("{:>16}", e.max_output_tokens) };
        println!(
            "{:<id_w$}  {:<prov_w$}  {}  {}  {}",
            e.id, e.provider, ctx, max_out, e.description,
            id_w = id_w, prov_w = prov_w,
        );
    }
    println!("\nTotal: {} model(s)", entries.len());
    Ok(())
}

fn list_providers_cmd(verbose: bool, as_json: bool) -> anyhow::Result<()> {
    let drivers = agentcore_model::list_drivers();

    if as_json {
        #[derive(serde::Serialize)]
        struct ProviderJson {
            id: &'static str,
            name: &'static str,
            description: &'static str,
            default_api_key_env: Option<&'static str>,
            default_base_url: Option<&'static str>,
            requires_api_key: bool,
        }
        let rows: Vec<ProviderJson> = drivers
            .iter()
            .map(|d| ProviderJson {
                id: d.id,
                name: d.name,
                description: d.description,
                default_api_key_env: d.default_api_key_env,
                default_base_url: d.default_base_url,
                requires_api_key: d.requires_api_key,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Supported Model Providers ({} total)\n", drivers.len());
    if verbose {
        for d in drivers {
            println!("  {} — {}", d.id, d.name);
            println!("    {}", d.description);
            if let Some(env) = d.default_api_key_env {
                println!("    API key env : {env}");
            }
            if let Some(url) = d.default_base_url {
                println!("    Default URL : {url}");
            }
            if !d.requires_api_key {
                println!("    Auth        : none required");
            }
            println!();
        }
    } else {
        let id_w = drivers.iter().map(|d| d.id.len()).max().unwrap_or(10).max(10);
        let name_w = drivers.iter().map(|d| d.name.len()).max().unwrap_or(8).max(8);
        println!("{:<id_w$}  {:<name_w$}  DESCRIPTION", "ID", "NAME");
        println!("{}", "-".repeat(id_w + name_w + 40));
        for d in drivers {
            println!("{:<id_w$}  {:<name_w$}  {}", d.id, d.name, d.description);
        }
        println!("\nUse `agentcore list-providers --verbose` for API key and URL details.");
        println!("Use `agentcore list-models --provider <ID>` to see models for a specific provider.");
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
