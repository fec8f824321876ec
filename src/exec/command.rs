// src/exec/command.rs

//! Shell-command task runner.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::backend::{RunFuture, TaskRunner};
use crate::tracker::ProgressHandle;

/// `::progress <pct> [message]` lines on stdout are progress reports, not output.
static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^::progress\s+(\d{1,3})%?(?:\s+(.*))?$").expect("progress pattern is valid")
});

/// Runs a role's command once per task.
///
/// Task fields are passed as `WAVEDAG_*` environment variables; upstream
/// results arrive as a JSON object in `WAVEDAG_UPSTREAM`. Stdout becomes the
/// result payload (JSON if it parses, else a string). A non-zero exit, a spawn
/// error or an elapsed timeout is a failure.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    cmd: String,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new(cmd: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            cmd: cmd.into(),
            timeout,
        }
    }

    async fn run_inner(&self, task: ScheduledTask, progress: &ProgressHandle) -> Result<TaskOutcome> {
        info!(
            task = %task.id,
            role = %task.role,
            wave = task.wave,
            cmd = %self.cmd,
            "starting task process"
        );

        let upstream =
            serde_json::to_string(&task.upstream).context("serializing upstream results")?;

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("WAVEDAG_TASK_ID", &task.id)
            .env("WAVEDAG_TITLE", &task.title)
            .env("WAVEDAG_DESCRIPTION", &task.description)
            .env("WAVEDAG_ROLE", &task.role)
            .env("WAVEDAG_EFFORT", &task.effort)
            .env("WAVEDAG_WAVE", task.wave.to_string())
            .env("WAVEDAG_UPSTREAM", upstream)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", task.id))?;

        let stdout = child
            .stdout
            .take()
            .context("task process has no stdout pipe")?;

        // Drain stderr so the pipe never fills up.
        if let Some(stderr) = child.stderr.take() {
            let task_id = task.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_id, "stderr: {}", line);
                }
            });
        }

        let collect = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut output = Vec::new();
            while let Some(line) = lines
                .next_line()
                .await
                .context("reading task stdout")?
            {
                match parse_progress_line(&line) {
                    Some((pct, message)) => progress.report(Some(pct), message),
                    None => output.push(line),
                }
            }
            let status = child.wait().await.context("waiting for task process")?;
            anyhow::Ok((status, output))
        };

        let (status, output) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, collect).await {
                Ok(res) => res?,
                Err(_) => {
                    warn!(task = %task.id, timeout = ?limit, "task timed out; killing process");
                    if let Err(e) = child.kill().await {
                        warn!(task = %task.id, error = %e, "failed to kill timed-out process");
                    }
                    return Ok(TaskOutcome::Failure(format!(
                        "task timed out after {limit:?}"
                    )));
                }
            },
            None => collect.await?,
        };

        let code = status.code().unwrap_or(-1);
        info!(
            task = %task.id,
            exit_code = code,
            success = status.success(),
            "task process exited"
        );

        if !status.success() {
            return Ok(TaskOutcome::Failure(format!(
                "command exited with code {code}"
            )));
        }

        Ok(TaskOutcome::Success(payload_from_output(&output)))
    }
}

impl TaskRunner for CommandRunner {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_> {
        Box::pin(async move {
            let task_id = task.id.clone();
            match self.run_inner(task, &progress).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(task = %task_id, error = %err, "task execution error");
                    TaskOutcome::Failure(format!("{err:#}"))
                }
            }
        })
    }
}

/// Percentage (clamped to 100) and message of a `::progress` line.
fn parse_progress_line(line: &str) -> Option<(u8, String)> {
    let caps = PROGRESS_LINE.captures(line.trim_end())?;
    let pct: u16 = caps.get(1)?.as_str().parse().ok()?;
    let message = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((pct.min(100) as u8, message))
}

fn payload_from_output(lines: &[String]) -> Value {
    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
