// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

use agentcore_config::AgentMode;

/// Output format for a headless run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormatArg {
    /// Full conversation format (## User / ## Agent / ## Tool / ## Tool Result).
    #[default]
    Conversation,
    /// Structured JSON: title + array of steps with metadata.
    Json,
    /// Compact plain text: only the final agent response for each step.
    Compact,
}

#[derive(Parser, Debug)]
#[command(
    name = "agentcore",
    about = "An agentic coding assistant core for CLI and CI",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional initial prompt or task description.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Agent mode.
    #[arg(long, short = 'm', value_enum, default_value = "agent")]
    pub mode: AgentMode,

    /// Model to use, e.g. "openai/gpt-4o" or "anthropic/claude-opus-4-5".
    #[arg(long, short = 'M', env = "AGENTCORE_MODEL")]
    pub model: Option<String>,

    /// Path to a markdown file with ordered step instructions.
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Resume a saved session by id.
    #[arg(long, value_name = "SESSION_ID", conflicts_with = "resume_continue")]
    pub resume: Option<String>,

    /// Resume the most recently updated session.
    #[arg(long = "continue")]
    pub resume_continue: bool,

    /// Overrides the session working directory.
    #[arg(long, value_name = "PATH")]
    pub working_dir: Option<PathBuf>,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Overrides `agent.max_tool_rounds` for this run.
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Output format for the run.
    #[arg(long, value_enum, default_value = "conversation")]
    pub output_format: OutputFormatArg,

    /// Pre-approve every tool call without prompting (use with care).
    #[arg(long)]
    pub approve_all: bool,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit.
    ShowConfig,
    /// List saved sessions.
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
    /// List available models for the configured provider(s).
    ListModels {
        /// Filter by provider id (e.g. "openai", "anthropic").
        #[arg(long, short = 'p')]
        provider: Option<String>,
        /// Query the provider API for the live list of available models.
        #[arg(long)]
        refresh: bool,
        /// Output as JSON instead of a formatted table.
        #[arg(long)]
        json: bool,
    },
    /// List all supported model providers.
    ListProviders {
        /// Show detailed information for each provider.
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// True when stdin is not a terminal, i.e. input is piped in.
    pub fn stdin_is_piped(&self) -> bool {
        !std::io::stdin().is_terminal()
    }
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "agentcore", &mut std::io::stdout());
}

trait IsTerminal {
    fn is_terminal(&self) -> bool;
}

impl IsTerminal for std::io::Stdin {
    fn is_terminal(&self) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe { libc::isatty(self.as_raw_fd()) != 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}
