//! Backend child process.
//!
//! # Responsibilities
//! - Launch the store process when configured to (`backend.spawn`)
//! - Forward its stdout/stderr into the log, line by line
//! - Log its exit status, whether expected or not
//! - Stop it when the proxy shuts down
//!
//! # Design Decisions
//! - No restart policy: an exited backend stays down and the health
//!   endpoint reports it
//! - `kill_on_drop` so a panicking proxy never leaks the child

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::BackendConfig;

/// Error type for backend process management.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn backend process '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("backend supervisor task failed: {0}")]
    Supervisor(#[from] tokio::task::JoinError),
}

/// A running backend process and the task supervising it.
#[derive(Debug)]
pub struct BackendProcess {
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<Option<ExitStatus>>,
}

impl BackendProcess {
    /// Launch `config.command` with `config.args`.
    pub fn spawn(config: &BackendConfig) -> Result<Self, ProcessError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let pid = child.id();
        tracing::info!(
            command = %config.command,
            args = ?config.args,
            pid = ?pid,
            "Backend process started"
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(child, stop_rx));

        Ok(Self {
            pid,
            stop_tx: Some(stop_tx),
            supervisor,
        })
    }

    /// OS process id, if the child was still running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has already exited on its own.
    pub fn has_exited(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Kill the process (if still running) and wait for it to exit.
    pub async fn stop(mut self) -> Result<Option<ExitStatus>, ProcessError> {
        if let Some(tx) = self.stop_tx.take() {
            // Err means the supervisor already returned.
            let _ = tx.send(());
        }
        Ok(self.supervisor.await?)
    }
}

async fn supervise(mut child: Child, stop_rx: oneshot::Receiver<()>) -> Option<ExitStatus> {
    tokio::select! {
        status = child.wait() => {
            match &status {
                Ok(status) => tracing::warn!(code = ?status.code(), "Backend process exited"),
                Err(e) => tracing::error!(error = %e, "Failed to wait on backend process"),
            }
            status.ok()
        }
        _ = stop_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill backend process");
            }
            let status = child.wait().await.ok();
            tracing::info!(code = ?status.and_then(|s| s.code()), "Backend process stopped");
            status
        }
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => tracing::warn!(target: "backend", "{line}"),
            Ok(Some(line)) => tracing::info!(target: "backend", "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading backend output");
                break;
            }
        }
    }
}
