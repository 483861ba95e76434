//! End-to-end attach run
//!
//! Binds the endpoint, launches the target, attaches with retries, then
//! walks the target through initialization, resume and exit. Whatever
//! happens, the run ends in exactly one verdict.

use std::sync::Arc;
use std::time::Duration;

use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::connector::local::HANDSHAKE_TIMEOUT_ARGUMENT;
use crate::connector::{bind_endpoint, ArgumentSet, Connector, ConnectorRegistry};
use crate::lifecycle::{sibling_executable, LaunchCommand, TargetSession};
use crate::supervisor::{AttachSupervisor, RetryBudget};
use crate::verdict::{Verdict, VerdictPolicy};

/// Parse the optional delay override from the positional arguments
///
/// Index 0 is reserved. Index 1, when present, must be an integer number of
/// milliseconds; when absent the configured default applies.
pub fn parse_delay_override(positional: &[String]) -> Result<Option<i64>> {
    match positional.get(1) {
        None => Ok(None),
        Some(raw) => raw.parse::<i32>().map(|ms| Some(i64::from(ms))).map_err(|_| {
            Error::Config(format!(
                "Incorrect test parameter: timeout value must be an integer, got '{}'",
                raw
            ))
        }),
    }
}

/// Drives a single attach run
pub struct Harness {
    config: Config,
    registry: ConnectorRegistry,
}

impl Harness {
    pub fn new(config: Config, registry: ConnectorRegistry) -> Self {
        Self { config, registry }
    }

    pub fn policy(&self) -> VerdictPolicy {
        VerdictPolicy::new(self.config.verdict.status_base)
    }

    /// Run to completion and report the verdict
    pub async fn run(&self, positional: &[String]) -> Verdict {
        let policy = self.policy();
        let verdict = match self.try_run(positional, &policy).await {
            Ok(verdict) => verdict,
            Err(e) => policy.fail(e.to_string()),
        };

        match &verdict.message {
            None => tracing::info!(exit_code = verdict.exit_code, "Test passed"),
            Some(message) => tracing::error!(exit_code = verdict.exit_code, "{}", message),
        }
        verdict
    }

    async fn try_run(&self, positional: &[String], policy: &VerdictPolicy) -> Result<Verdict> {
        let delay_ms = parse_delay_override(positional)?.unwrap_or(self.config.attach.attempt_delay_ms);
        let wait_time_ms = self.config.attach.wait_time_ms();
        let budget = RetryBudget::new(delay_ms, wait_time_ms)?;
        tracing::debug!(
            attempt_delay_ms = budget.attempt_delay_ms(),
            max_attempts = budget.max_attempts(),
            "Retry budget"
        );

        let connector = self.registry.find(&self.config.attach.connector)?;
        if !connector.is_supported() {
            tracing::info!(
                connector = connector.name(),
                "Connector not supported on this platform, nothing to test"
            );
            return Ok(policy.pass());
        }

        let endpoint = paths::new_endpoint();
        let arguments = self.bind_arguments(connector.as_ref(), &endpoint)?;
        let command = self.launch_command(&endpoint)?;

        paths::ensure_endpoint_dir(&endpoint)?;
        let mut session = TargetSession::launch(&command)?;

        let outcome = drive(
            &mut session,
            &AttachSupervisor::new(budget),
            connector.as_ref(),
            &arguments,
            Duration::from_millis(wait_time_ms),
        )
        .await;

        session.close().await;
        if let Err(e) = paths::remove_endpoint(&endpoint) {
            tracing::debug!(error = %e, "Could not remove endpoint");
        }

        Ok(match outcome {
            Ok(exit_code) => {
                tracing::info!(exit_code, "Target exited");
                policy.aggregate(Ok(()), Some(exit_code))
            }
            Err(e) => policy.aggregate(Err(&e), None),
        })
    }

    fn bind_arguments(&self, connector: &dyn Connector, endpoint: &str) -> Result<ArgumentSet> {
        let mut arguments = connector.default_arguments();
        arguments.set_if_declared(
            HANDSHAKE_TIMEOUT_ARGUMENT,
            &self.config.attach.handshake_timeout_ms.to_string(),
        );
        bind_endpoint(&mut arguments, connector.name(), endpoint)?;
        Ok(arguments)
    }

    fn launch_command(&self, endpoint: &str) -> Result<LaunchCommand> {
        let target = &self.config.target;
        let program = sibling_executable(&target.program).unwrap_or_else(|| target.program.clone());
        LaunchCommand::new(program, target.args_for(endpoint)).resolve()
    }
}

/// Attached -> Initialized -> Resumed -> Terminated, each step fatal on failure
async fn drive(
    session: &mut TargetSession,
    supervisor: &AttachSupervisor,
    connector: &dyn Connector,
    arguments: &ArgumentSet,
    wait_time: Duration,
) -> Result<i32> {
    session.await_attach(supervisor, connector, arguments).await?;
    session.await_initialization(wait_time).await?;
    session.resume().await?;
    session.await_termination(wait_time).await
}

/// Harness over the built-in connectors
impl From<Config> for Harness {
    fn from(config: Config) -> Self {
        Self::new(config, ConnectorRegistry::builtin())
    }
}

/// Harness over a single extra connector, shadowing any built-in of the same name
pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Harness {
    Harness::new(config, ConnectorRegistry::builtin().with(connector))
}
