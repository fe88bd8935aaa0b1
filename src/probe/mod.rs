//! Probe execution
//!
//! [`SystemProbeExecutor`] is the production [`ProbeExecutor`]. Each [`ProbeKind`] is
//! handled by exactly one function:
//!
//! * `Command` spawns a subprocess with stdin closed, as the leader of its own process
//!   group. A probe abandoned by its timeout kills the whole group, so pipelines run
//!   through `sh -c` leave nothing behind
//! * `File` reads a kernel interface (or any file) asynchronously
//! * `Syscall` runs on the blocking pool (see the `syscall` module)
//!
//! The raw output then goes through the probe's [`OutputParser`](crate::registry::OutputParser).

pub mod constants;
mod parse;
mod syscall;


use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use scopeguard::ScopeGuard;
use tokio::process::Command;
use tracing::{trace, warn};

use crate::core::types::MetricValue;
use crate::error::{Error, Result};
use crate::probe::constants::STDERR_EXCERPT;
use crate::registry::{ProbeKind, ProbeSpec};
use crate::traits::ProbeExecutor;

/// Executes probes against the local host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbeExecutor;

impl SystemProbeExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeExecutor for SystemProbeExecutor {
    async fn execute(&self, probe: &ProbeSpec) -> Result<MetricValue> {
        let label = probe.label();
        let raw = match &probe.kind {
            ProbeKind::Command { program, args } => run_command(&label, program, args).await?,
            ProbeKind::File { path } => read_file(&label, path).await?,
            ProbeKind::Syscall { call } => syscall::run(&label, call.clone()).await?,
        };
        trace!(probe = %label, bytes = raw.len(), "probe output captured");
        probe.parser.parse(&label, &raw)
    }
}

async fn run_command(label: &str, program: &str, args: &[String]) -> Result<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::probe_failed(label, format!("spawn failed: {e}")))?;

    // fires only if this future is dropped (or the wait fails) before the child is reaped
    let group = child.id().map(|pid| scopeguard::guard(pid, kill_group));
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::probe_failed(label, format!("wait failed: {e}")))?;
    if let Some(group) = group {
        ScopeGuard::into_inner(group);
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
        return Err(Error::probe_failed(label, format!("exited with {}: {excerpt}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Sends SIGKILL to every process in the group led by `pgid`
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg takes no pointers; a group that already exited yields ESRCH
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "failed to kill abandoned probe process group");
        }
    } else {
        trace!(pgid, "killed abandoned probe process group");
    }
}

async fn read_file(label: &str, path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| Error::probe_failed(label, e.to_string()))
}
