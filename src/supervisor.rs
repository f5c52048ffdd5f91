//! Lifecycle management for the external motion-detection process.
//!
//! The PID file is the single source of truth: nothing is cached, every query
//! re-reads the file and the process table, so state survives controller
//! restarts.

use crate::error::ProcessError;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Result of [`ProcessSupervisor::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Spawned, but not confirmed alive within the polling window
    StillNotRunning,
}

/// Result of [`ProcessSupervisor::stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited; `forced` is set when SIGKILL was needed
    Stopped { forced: bool },
    /// No live process. `stale_pid_removed` is set when a leftover PID file was deleted.
    NotRunning { stale_pid_removed: bool },
    /// The process survived both SIGTERM and SIGKILL
    StopFailed,
}

/// Starts, stops and queries a long-running process through its PID file
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    pid_file: PathBuf,
    poll_interval: Duration,
    poll_attempts: u32,
    alive: fn(i32) -> bool,
}

impl ProcessSupervisor {
    pub fn new<P: Into<PathBuf>>(pid_file: P) -> Self {
        Self {
            pid_file: pid_file.into(),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 10,
            alive: process_alive,
        }
    }

    /// Override the liveness polling cadence
    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    /// Replace the check used to decide whether a PID is still alive
    pub fn with_liveness_check(mut self, alive: fn(i32) -> bool) -> Self {
        self.alive = alive;
        self
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Read the PID file. `Ok(None)` when the file does not exist.
    pub async fn read_pid(&self) -> Result<Option<i32>, ProcessError> {
        let content = match tokio::fs::read_to_string(&self.pid_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProcessError::InvalidPidFile {
                    path: self.pid_file.display().to_string(),
                    details: e.to_string(),
                })
            }
        };

        content
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|e| ProcessError::InvalidPidFile {
                path: self.pid_file.display().to_string(),
                details: format!("{:?}: {}", content.trim(), e),
            })
    }

    /// True iff the PID file exists, parses, and names a live process
    pub async fn is_running(&self) -> bool {
        match self.read_pid().await {
            Ok(Some(pid)) => (self.alive)(pid),
            Ok(None) => false,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Start `command` unless already running, then wait for it to show up
    pub async fn start(&self, command: &str) -> Result<StartOutcome, ProcessError> {
        if self.is_running().await {
            debug!("Process already running, not starting '{}'", command);
            return Ok(StartOutcome::AlreadyRunning);
        }

        info!("Starting process: {}", command);
        let mut child = shell(command)
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                command: command.to_string(),
                source,
            })?;

        let command_name = command.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("'{}' exited with {}", command_name, status),
                Err(e) => warn!("Failed to wait for '{}': {}", command_name, e),
            }
        });

        for _ in 0..self.poll_attempts {
            if self.is_running().await {
                info!("Process now running");
                return Ok(StartOutcome::Started);
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        warn!("Process still not running after {:?}", self.poll_interval * self.poll_attempts);
        Ok(StartOutcome::StillNotRunning)
    }

    /// Stop the process named in the PID file, escalating to SIGKILL
    pub async fn stop(&self) -> Result<StopOutcome, ProcessError> {
        let Some(pid) = self.read_pid().await? else {
            debug!("No PID file at {}", self.pid_file.display());
            return Ok(StopOutcome::NotRunning {
                stale_pid_removed: false,
            });
        };

        if !(self.alive)(pid) {
            info!("Removing stale PID file for {}", pid);
            if let Err(e) = tokio::fs::remove_file(&self.pid_file).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove stale PID file: {}", e);
                }
            }
            return Ok(StopOutcome::NotRunning {
                stale_pid_removed: true,
            });
        }

        info!("Sending SIGTERM to {}", pid);
        send_signal(pid, libc::SIGTERM)?;
        if self.wait_for_exit(pid).await {
            return Ok(StopOutcome::Stopped { forced: false });
        }

        warn!("Process {} ignored SIGTERM, sending SIGKILL", pid);
        send_signal(pid, libc::SIGKILL)?;
        if self.wait_for_exit(pid).await {
            return Ok(StopOutcome::Stopped { forced: true });
        }

        error!("Process {} survived SIGKILL", pid);
        Ok(StopOutcome::StopFailed)
    }

    /// Send SIGKILL to every process called `process_name`.
    ///
    /// Only reports that the signal was sent, never that anything died.
    pub async fn kill(&self, process_name: &str) -> Result<(), ProcessError> {
        info!("Sending SIGKILL to all '{}' processes", process_name);
        let status = Command::new("killall")
            .args(["-9", process_name])
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ProcessError::SpawnFailed {
                command: format!("killall -9 {}", process_name),
                source,
            })?;
        debug!("killall exited with {}", status);
        Ok(())
    }

    async fn wait_for_exit(&self, pid: i32) -> bool {
        for _ in 0..self.poll_attempts {
            if !(self.alive)(pid) {
                info!("Process {} has stopped", pid);
                return true;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        !(self.alive)(pid)
    }
}

/// Build a `sh -c` invocation, which takes care of tokenizing `command`
pub fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]).stdin(Stdio::null());
    cmd
}

/// Whether `pid` names a live, non-zombie process
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }

    // Signal 0 only checks for existence and permission
    let rc = unsafe { libc::kill(pid, 0) };
    if rc != 0 && io::Error::last_os_error().raw_os_error() != Some(libc::EPERM) {
        return false;
    }

    !is_zombie(pid)
}

fn is_zombie(pid: i32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // state follows the parenthesised command name
    stat.rfind(')')
        .and_then(|idx| stat[idx + 1..].split_whitespace().next())
        .map(|state| state == "Z")
        .unwrap_or(false)
}

fn send_signal(pid: i32, signal: libc::c_int) -> Result<(), ProcessError> {
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // already gone
        return Ok(());
    }
    Err(ProcessError::SignalFailed { pid, source: err })
}
