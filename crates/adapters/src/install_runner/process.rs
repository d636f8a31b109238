// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production `InstallRunner`: direct invocation of the package-manager
//! binary in the sandbox directory (spec §9's "direct binary invocation"
//! strategy — the bound, not the choice of launcher, is what's specified).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{CancelToken, InstallError, InstallRunner, OutputSink, StreamTag};

/// How often the runner checks `cancel` while an install is in flight.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone)]
pub struct ProcessInstallRunner {
    program: String,
    args: Vec<String>,
}

impl ProcessInstallRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// A "focus install" (spec glossary): only this package's own
    /// dependencies, not a whole workspace.
    pub fn npm_focus_install() -> Self {
        Self::new("npm", vec!["install".to_string(), "--omit=dev".to_string()])
    }
}

#[async_trait]
impl InstallRunner for ProcessInstallRunner {
    async fn install(
        &self,
        sandbox_path: &Path,
        on_output: OutputSink,
        cancel: CancelToken,
    ) -> Result<(), InstallError> {
        if cancel.is_canceled() {
            return Err(InstallError::Canceled);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(sandbox_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| InstallError::Failed(e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_sink = on_output.clone();
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stdout_sink(StreamTag::Stdout, line.as_bytes());
                }
            }
        });

        let stderr_sink = on_output.clone();
        let stderr_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stderr_sink(StreamTag::Stderr, line.as_bytes());
                }
            }
        });

        let mut poll = tokio::time::interval(CANCEL_POLL_INTERVAL);
        let status = loop {
            tokio::select! {
                status = child.wait() => break status.map_err(|e| InstallError::Failed(e.to_string())),
                _ = poll.tick() => {
                    if cancel.is_canceled() {
                        let _ = child.kill().await;
                        break Err(InstallError::Canceled);
                    }
                }
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        match status? {
            exit if exit.success() => Ok(()),
            exit => Err(InstallError::Failed(format!(
                "install exited with {exit}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn successful_install_reports_no_error() {
        let runner = ProcessInstallRunner::new("true", vec![]);
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let sink: OutputSink = Arc::new(move |_tag, _bytes| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let result = runner.install(dir.path(), sink, CancelToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failing_install_reports_failed() {
        let runner = ProcessInstallRunner::new("false", vec![]);
        let dir = tempfile::tempdir().unwrap();
        let sink: OutputSink = Arc::new(|_, _| {});
        let result = runner.install(dir.path(), sink, CancelToken::new()).await;
        assert!(matches!(result, Err(InstallError::Failed(_))));
    }

    #[tokio::test]
    async fn preemptively_canceled_job_never_spawns() {
        let runner = ProcessInstallRunner::new("true", vec![]);
        let dir = tempfile::tempdir().unwrap();
        let sink: OutputSink = Arc::new(|_, _| {});
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = runner.install(dir.path(), sink, cancel).await;
        assert!(matches!(result, Err(InstallError::Canceled)));
    }

    #[tokio::test]
    async fn captures_stdout_lines() {
        let runner = ProcessInstallRunner::new("echo", vec!["hello".to_string()]);
        let dir = tempfile::tempdir().unwrap();
        let lines = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let lines2 = Arc::clone(&lines);
        let sink: OutputSink = Arc::new(move |tag, bytes| {
            if tag == StreamTag::Stdout {
                lines2.lock().push(String::from_utf8_lossy(bytes).to_string());
            }
        });
        runner.install(dir.path(), sink, CancelToken::new()).await.unwrap();
        assert_eq!(lines.lock().as_slice(), ["hello"]);
    }
}
