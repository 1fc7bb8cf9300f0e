// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared subprocess runner for the shell-like tools: spawns a command in its
//! own session/process group and races it against a timeout and a
//! cooperative [`CancellationToken`], so a cancelled agent turn interrupts a
//! running command within one polling interval rather than waiting for it to
//! finish on its own.
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// How long to wait after SIGTERM before escalating to SIGKILL.
const TERM_GRACE_PERIOD: Duration = Duration::from_secs(2);

pub enum ProcessOutcome {
    Finished {
        status: std::process::ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut,
    /// The caller's `cancel` token fired before the command exited.
    Cancelled,
    SpawnError(std::io::Error),
}

/// Run `cmd` to completion, piping stdout/stderr, unless `timeout` elapses or
/// `cancel` is triggered first — in either case the process (and any
/// children sharing its process group) is sent SIGTERM, given
/// [`TERM_GRACE_PERIOD`] to exit, then SIGKILL.
pub async fn run_with_cancellation(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ProcessOutcome {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return ProcessOutcome::SpawnError(e),
    };
    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    enum Interrupted {
        TimedOut,
        Cancelled,
    }

    let interrupted = tokio::select! {
        biased;
        _ = cancel.cancelled() => Interrupted::Cancelled,
        _ = tokio::time::sleep(timeout) => Interrupted::TimedOut,
        status = child.wait() => {
            return match status {
                Ok(status) => ProcessOutcome::Finished {
                    status,
                    stdout: stdout_task.await.unwrap_or_default(),
                    stderr: stderr_task.await.unwrap_or_default(),
                },
                Err(e) => ProcessOutcome::SpawnError(e),
            };
        }
    };

    terminate_then_kill(&mut child).await;
    let _ = child.wait().await;
    let _ = stdout_task.await;
    let _ = stderr_task.await;
    match interrupted {
        Interrupted::TimedOut => ProcessOutcome::TimedOut,
        Interrupted::Cancelled => ProcessOutcome::Cancelled,
    }
}

/// Send SIGTERM to the whole process group, wait up to [`TERM_GRACE_PERIOD`]
/// for the child to exit on its own, then SIGKILL if it hasn't.
#[cfg(unix)]
async fn terminate_then_kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe { libc::kill(-(pid as i32), libc::SIGTERM) };
    }
    let _ = tokio::time::timeout(TERM_GRACE_PERIOD, child.wait()).await;
    if child.try_wait().ok().flatten().is_none() {
        if let Some(pid) = child.id() {
            unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        }
    }
}

#[cfg(not(unix))]
async fn terminate_then_kill(child: &mut Child) {
    let _ = child.start_kill();
}
