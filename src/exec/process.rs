// src/exec/process.rs

//! Child process runner used by the launch step.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dag::CancelToken;

/// How often the stdout log of a starting process is re-read.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What to run and when to consider it "up".
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub label: String,
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    /// If set, the process counts as started once a stdout line matches;
    /// it is then left running in the background.
    pub ready_on_stdout: Option<Regex>,
    /// Where a process left running writes `<label>.stdout.log` and
    /// `<label>.stderr.log`. Required together with `ready_on_stdout`.
    pub log_dir: Option<PathBuf>,
}

impl ProcessSpec {
    /// Log files of a process left running, as `(stdout, stderr)`.
    pub fn log_paths(&self) -> Option<(PathBuf, PathBuf)> {
        let dir = self.log_dir.as_ref()?;
        let stem = log_stem(&self.label);
        Some((
            dir.join(format!("{stem}.stdout.log")),
            dir.join(format!("{stem}.stderr.log")),
        ))
    }
}

fn log_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// How [`run_process`] returned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A stdout line matched `ready_on_stdout`; the process is still running.
    Ready,
    /// The process exited with a success status.
    Exited,
}

enum ReadyEvent {
    Poll,
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
}

enum WaitEvent {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    }
}

/// Spawn the process described by `spec` and wait until it is ready or has
/// exited.
///
/// - Non-zero exit status is an error.
/// - If `cancel` fires first the child is killed and an error is returned.
/// - A process that became ready writes to its log files, never to pipes
///   owned by the launcher, so it outlives the launcher.
pub async fn run_process(spec: &ProcessSpec, cancel: &CancelToken) -> Result<ProcessOutcome> {
    info!(label = %spec.label, cmd = %spec.cmd, cwd = ?spec.cwd, "starting process");

    let mut cmd = shell_command(&spec.cmd);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null()).kill_on_drop(false);

    match &spec.ready_on_stdout {
        Some(ready) => {
            let Some((stdout_log, stderr_log)) = spec.log_paths() else {
                bail!(
                    "step '{}': ready_on_stdout needs a log directory for the process output",
                    spec.label
                );
            };
            let stdout = create_log(&stdout_log).await?;
            let stderr = create_log(&stderr_log).await?;
            cmd.stdout(stdout).stderr(stderr);

            let mut child = spawn(spec, &mut cmd)?;
            wait_for_ready(spec, ready, &mut child, &stdout_log, cancel).await
        }
        None => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

            let mut child = spawn(spec, &mut cmd)?;
            forward_lines(spec.label.clone(), "stdout", child.stdout.take());
            forward_lines(spec.label.clone(), "stderr", child.stderr.take());
            wait_for_exit(spec, &mut child, cancel).await
        }
    }
}

fn spawn(spec: &ProcessSpec, cmd: &mut Command) -> Result<Child> {
    cmd.spawn()
        .with_context(|| format!("spawning process for step '{}'", spec.label))
}

/// Truncate (or create) a log file and hand it over as a child's stdio.
async fn create_log(path: &Path) -> Result<Stdio> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .await
        .with_context(|| format!("creating log file {}", path.display()))?;
    Ok(Stdio::from(file.into_std().await))
}

/// Log every line of a piped stream at debug until it closes.
fn forward_lines<R>(label: String, stream: &'static str, reader: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else {
        return;
    };
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(label = %label, stream, "{}", line);
        }
    });
}

async fn wait_for_ready(
    spec: &ProcessSpec,
    ready: &Regex,
    child: &mut Child,
    stdout_log: &Path,
    cancel: &CancelToken,
) -> Result<ProcessOutcome> {
    let file = File::open(stdout_log)
        .await
        .with_context(|| format!("opening {}", stdout_log.display()))?;
    let mut tail = LogTail::new(file);

    let mut poll = time::interval(READY_POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if tail.scan(&spec.label, ready, false).await? {
            info!(
                label = %spec.label,
                log = %stdout_log.display(),
                "process reported ready; leaving it running"
            );
            return Ok(ProcessOutcome::Ready);
        }

        let event = tokio::select! {
            _ = poll.tick() => ReadyEvent::Poll,
            status = child.wait() => ReadyEvent::Exited(status),
            _ = cancel.cancelled() => ReadyEvent::Cancelled,
        };

        match event {
            ReadyEvent::Poll => {}
            ReadyEvent::Exited(status) => {
                let status = status
                    .with_context(|| format!("waiting for process of step '{}'", spec.label))?;
                // Output written just before the exit has not been scanned yet.
                if tail.scan(&spec.label, ready, true).await? {
                    info!(label = %spec.label, %status, "process reported ready, then exited");
                    return Ok(ProcessOutcome::Ready);
                }
                bail!(
                    "process exited ({status}) before printing a line matching `{}`",
                    ready.as_str()
                );
            }
            ReadyEvent::Cancelled => {
                kill_child(spec, child).await;
                bail!("step '{}' cancelled before the process became ready", spec.label);
            }
        }
    }
}

/// Incremental line reader over a log file that is still being written.
struct LogTail {
    reader: BufReader<File>,
    partial: Vec<u8>,
}

impl LogTail {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            partial: Vec::new(),
        }
    }

    /// Read what was appended since the last call. Returns `true` once a
    /// line matches. An unterminated last line only counts when `at_exit`.
    async fn scan(&mut self, label: &str, ready: &Regex, at_exit: bool) -> Result<bool> {
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut self.partial)
                .await
                .with_context(|| format!("reading output log of step '{label}'"))?;
            if read == 0 || self.partial.last() != Some(&b'\n') {
                break;
            }
            if self.take_line(label, ready) {
                return Ok(true);
            }
        }

        if at_exit && !self.partial.is_empty() {
            return Ok(self.take_line(label, ready));
        }
        Ok(false)
    }

    fn take_line(&mut self, label: &str, ready: &Regex) -> bool {
        let matched = {
            let line = String::from_utf8_lossy(&self.partial);
            let line = line.trim_end_matches(['\r', '\n']);
            debug!(label = %label, stream = "stdout", "{}", line);
            ready.is_match(line)
        };
        self.partial.clear();
        matched
    }
}

async fn wait_for_exit(
    spec: &ProcessSpec,
    child: &mut Child,
    cancel: &CancelToken,
) -> Result<ProcessOutcome> {
    let event = tokio::select! {
        status = child.wait() => WaitEvent::Exited(status),
        _ = cancel.cancelled() => WaitEvent::Cancelled,
    };

    match event {
        WaitEvent::Exited(status) => {
            let status = status
                .with_context(|| format!("waiting for process of step '{}'", spec.label))?;
            let code = status.code().unwrap_or(-1);

            info!(
                label = %spec.label,
                exit_code = code,
                success = status.success(),
                "process exited"
            );

            if status.success() {
                Ok(ProcessOutcome::Exited)
            } else {
                bail!("process for step '{}' exited with code {code}", spec.label)
            }
        }
        WaitEvent::Cancelled => {
            kill_child(spec, child).await;
            bail!("step '{}' cancelled while the process was running", spec.label)
        }
    }
}

async fn kill_child(spec: &ProcessSpec, child: &mut Child) {
    info!(label = %spec.label, "cancellation requested; killing process");
    if let Err(e) = child.kill().await {
        warn!(
            label = %spec.label,
            error = %e,
            "failed to kill child process on cancellation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_paths_use_a_safe_stem() {
        let spec = ProcessSpec {
            label: "play game/1".to_string(),
            cmd: "true".to_string(),
            cwd: None,
            ready_on_stdout: None,
            log_dir: Some(PathBuf::from("logs")),
        };
        let (stdout, stderr) = spec.log_paths().unwrap();
        assert_eq!(stdout, PathBuf::from("logs/play_game_1.stdout.log"));
        assert_eq!(stderr, PathBuf::from("logs/play_game_1.stderr.log"));
    }

    #[test]
    fn no_log_dir_means_no_log_paths() {
        let spec = ProcessSpec {
            label: "play".to_string(),
            cmd: "true".to_string(),
            cwd: None,
            ready_on_stdout: None,
            log_dir: None,
        };
        assert!(spec.log_paths().is_none());
    }
}
