// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod approval;
pub mod builtin;
pub mod events;
pub mod registry;
pub mod tool;

pub use approval::{
    ApprovalManager, ApprovalPreview, ApprovalPrompter, ApprovalRule, ChannelPrompter, Decision,
    NonInteractivePrompter, PromptReply,
};
pub use events::{TodoItem, ToolEvent};
pub use registry::{build_tool_registry, ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, PermissionClass, Tool, ToolCall, ToolOutput};

pub use builtin::edit_file::EditFileTool;
pub use builtin::glob_file_search::GlobFileSearchTool;
pub use builtin::grep::GrepTool;
pub use builtin::list_dir::ListDirTool;
pub use builtin::read_file::ReadFileTool;
pub use builtin::run_terminal_command::RunTerminalCommandTool;
pub use builtin::shell::ShellTool;
pub use builtin::todo_write::TodoWriteTool;
pub use builtin::web_fetch::WebFetchTool;
pub use builtin::web_search::WebSearchTool;
pub use builtin::write_file::WriteTool;
