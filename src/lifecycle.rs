//! Target process lifecycle
//!
//! A `TargetSession` owns the launched process and, once attached, the
//! connection to it. Each step is a guarded transition:
//!
//! ```text
//! Launched -> Attached -> Initialized -> Resumed -> Terminated
//! ```
//!
//! The process is killed when the session is dropped, so every exit path
//! releases it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::common::logging;
use crate::common::{Error, Result};
use crate::connector::{ArgumentSet, Connection, Connector, TargetInfo};
use crate::supervisor::AttachSupervisor;

/// How long to keep forwarding output after the target exited
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Program and arguments used to start the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Resolve a bare program name through PATH, then the working directory
    ///
    /// Names containing a path separator are used as given.
    pub fn resolve(mut self) -> Result<Self> {
        if self.program.components().count() != 1 {
            return Ok(self);
        }
        match which::which(&self.program) {
            Ok(found) => self.program = found,
            Err(_) if self.program.is_file() => self.program = Path::new(".").join(&self.program),
            Err(e) => {
                return Err(Error::LaunchFailed(format!(
                    "{}: {}",
                    self.program.display(),
                    e
                )))
            }
        }
        Ok(self)
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Lifecycle states of a target session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Launched,
    Attached,
    Initialized,
    Resumed,
    Terminated,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launched => write!(f, "launched"),
            Self::Attached => write!(f, "attached"),
            Self::Initialized => write!(f, "initialized"),
            Self::Resumed => write!(f, "resumed"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// A launched target and its control connection
pub struct TargetSession {
    child: Child,
    connection: Option<Box<dyn Connection>>,
    state: TargetState,
    forwarders: Vec<JoinHandle<()>>,
}

impl TargetSession {
    /// Spawn the target with stdout/stderr forwarded to the log
    pub fn launch(command: &LaunchCommand) -> Result<Self> {
        tracing::info!("command: {}", command);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::LaunchFailed(format!("{}: {}", command.program.display(), e))
            })?;

        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(logging::forward_lines(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(logging::forward_lines(stderr, "stderr"));
        }

        tracing::debug!(pid = child.id(), "Target launched");

        Ok(Self {
            child,
            connection: None,
            state: TargetState::Launched,
            forwarders,
        })
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// OS process id, while the process is running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Identity of the attached target
    pub fn target(&self) -> Option<&TargetInfo> {
        self.connection.as_ref().map(|c| c.target())
    }

    fn require(&self, action: &str, expected: TargetState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::invalid_state(action, &self.state.to_string()))
        }
    }

    /// Attach through `supervisor` and take ownership of the connection
    pub async fn await_attach(
        &mut self,
        supervisor: &AttachSupervisor,
        connector: &dyn Connector,
        arguments: &ArgumentSet,
    ) -> Result<&TargetInfo> {
        self.require("attach", TargetState::Launched)?;

        let result = supervisor.attach(connector, arguments).await;
        tracing::debug!(state = %result.state(), attempts = result.attempts(), "Attach finished");

        let connection = result.into_connection()?;
        let target = self.connection.insert(connection).target();
        self.state = TargetState::Attached;

        tracing::info!(
            name = %target.name,
            version = %target.version,
            description = %target.description,
            "Attached to target"
        );
        Ok(target)
    }

    /// Install an already established connection
    pub fn attached(&mut self, connection: Box<dyn Connection>) -> Result<()> {
        self.require("attach", TargetState::Launched)?;
        self.connection = Some(connection);
        self.state = TargetState::Attached;
        Ok(())
    }

    /// Wait for the target's initialization signal
    pub async fn await_initialization(&mut self, timeout: Duration) -> Result<()> {
        self.require("wait for initialization", TargetState::Attached)?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::Internal("attached session without connection".to_string()))?;

        tokio::time::timeout(timeout, connection.wait_for_init())
            .await
            .map_err(|_| Error::timeout("Waiting for target initialization", millis(timeout)))??;

        self.state = TargetState::Initialized;
        tracing::debug!("Target initialized");
        Ok(())
    }

    /// Let the target continue
    pub async fn resume(&mut self) -> Result<()> {
        self.require("resume", TargetState::Initialized)?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::Internal("initialized session without connection".to_string()))?;

        tracing::info!("Resuming target");
        connection.resume().await?;
        self.state = TargetState::Resumed;
        Ok(())
    }

    /// Wait for the target process to exit and return its exit code
    pub async fn await_termination(&mut self, timeout: Duration) -> Result<i32> {
        self.require("wait for exit", TargetState::Resumed)?;
        tracing::info!("Waiting for target exit");

        let status = tokio::time::timeout(timeout, self.child.wait())
            .await
            .map_err(|_| Error::timeout("Waiting for target exit", millis(timeout)))??;

        self.state = TargetState::Terminated;
        // Drain buffered output; a grandchild may still hold the pipes open
        for forwarder in self.forwarders.drain(..) {
            let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, forwarder).await;
        }

        status.code().ok_or(Error::TargetSignaled)
    }

    /// Release the connection and the process
    ///
    /// Safe to call in any state; a running target is killed.
    pub async fn close(mut self) {
        if let Some(mut connection) = self.connection.take() {
            if self.state != TargetState::Terminated {
                if let Err(e) = connection.dispose().await {
                    tracing::debug!(error = %e, "Dispose failed");
                }
            }
        }

        if self.state != TargetState::Terminated {
            tracing::debug!("Killing target");
            let _ = self.child.kill().await;
            self.state = TargetState::Terminated;
        }

        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolve `program` relative to the directory of the running executable
pub fn sibling_executable(program: &Path) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe.parent()?.join(program);
    candidate.exists().then_some(candidate)
}
