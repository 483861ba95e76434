//! Attach supervisor
//!
//! Drives the bounded retry loop that attaches to a target:
//!
//! ```text
//! Idle -> Attempting -> Connected
//!                    -> Exhausted   (every attempt failed transiently)
//!                    -> Aborted     (a fatal failure, remaining budget unused)
//! ```
//!
//! Attempts are strictly sequential. Between two transient failures the
//! supervisor sleeps for the configured delay; there is no sleep after the
//! last attempt.

use std::fmt;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::connector::{ArgumentSet, Connection, Connector};

/// How many attempts to make and how far apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    attempt_delay_ms: u64,
    max_attempts: u64,
}

impl RetryBudget {
    /// Derive a budget that fits `total_timeout_ms`
    ///
    /// `max_attempts = floor(total_timeout_ms / attempt_delay_ms)`. A delay
    /// that isn't positive is a configuration error.
    pub fn new(attempt_delay_ms: i64, total_timeout_ms: u64) -> Result<Self> {
        if attempt_delay_ms <= 0 {
            return Err(Error::Config(format!(
                "attempt delay must be positive, got {} ms",
                attempt_delay_ms
            )));
        }
        let attempt_delay_ms = attempt_delay_ms as u64;

        Ok(Self {
            attempt_delay_ms,
            max_attempts: total_timeout_ms / attempt_delay_ms,
        })
    }

    pub fn attempt_delay(&self) -> Duration {
        Duration::from_millis(self.attempt_delay_ms)
    }

    pub fn attempt_delay_ms(&self) -> u64 {
        self.attempt_delay_ms
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }
}

/// Classified result of a single attach attempt
pub enum AttachOutcome {
    Connected(Box<dyn Connection>),
    TransientFailure(Error),
    FatalFailure(Error),
}

impl AttachOutcome {
    /// Classify the result of one `Connector::attach` call
    pub fn classify(result: Result<Box<dyn Connection>>) -> Self {
        match result {
            Ok(connection) => Self::Connected(connection),
            Err(e) if e.is_transient() => Self::TransientFailure(e),
            Err(e) => Self::FatalFailure(e),
        }
    }
}

impl fmt::Debug for AttachOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(c) => f.debug_tuple("Connected").field(&c.target().name).finish(),
            Self::TransientFailure(e) => f.debug_tuple("TransientFailure").field(e).finish(),
            Self::FatalFailure(e) => f.debug_tuple("FatalFailure").field(e).finish(),
        }
    }
}

/// Supervisor states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Attempting,
    Connected,
    Exhausted,
    Aborted,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting => write!(f, "attempting"),
            Self::Connected => write!(f, "connected"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Terminal result of a supervised attach
pub enum AttachResult {
    Connected {
        connection: Box<dyn Connection>,
        attempts: u64,
    },
    Exhausted {
        attempts: u64,
        last_error: Option<Error>,
    },
    Aborted {
        attempts: u64,
        cause: Error,
    },
}

impl AttachResult {
    /// Number of attach calls made
    pub fn attempts(&self) -> u64 {
        match self {
            Self::Connected { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn state(&self) -> SupervisorState {
        match self {
            Self::Connected { .. } => SupervisorState::Connected,
            Self::Exhausted { .. } => SupervisorState::Exhausted,
            Self::Aborted { .. } => SupervisorState::Aborted,
        }
    }

    /// Hand over the connection, or the error describing why there is none
    pub fn into_connection(self) -> Result<Box<dyn Connection>> {
        match self {
            Self::Connected { connection, .. } => Ok(connection),
            Self::Exhausted { attempts, .. } => Err(Error::AttachExhausted { attempts }),
            Self::Aborted { cause, .. } => Err(cause),
        }
    }
}

impl fmt::Debug for AttachResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachResult")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// Runs the retry loop against a connector
#[derive(Debug, Clone, Copy)]
pub struct AttachSupervisor {
    budget: RetryBudget,
}

impl AttachSupervisor {
    pub fn new(budget: RetryBudget) -> Self {
        Self { budget }
    }

    /// Attach to the target, retrying transient failures within the budget
    #[tracing::instrument(skip_all, fields(connector = connector.name(), max_attempts = self.budget.max_attempts))]
    pub async fn attach(&self, connector: &dyn Connector, arguments: &ArgumentSet) -> AttachResult {
        let max_attempts = self.budget.max_attempts;
        let mut attempt: u64 = 0;
        let mut last_error = None;

        tracing::debug!(state = %SupervisorState::Attempting, "Starting attach loop");

        while attempt < max_attempts {
            let index = attempt;
            attempt += 1;

            match AttachOutcome::classify(connector.attach(arguments).await) {
                AttachOutcome::Connected(connection) => {
                    tracing::info!(attempt = index, "Connection attempt #{} succeeded", index);
                    return AttachResult::Connected {
                        connection,
                        attempts: attempt,
                    };
                }
                AttachOutcome::TransientFailure(e) => {
                    tracing::info!(attempt = index, error = %e, "Connection attempt #{} failed", index);
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.budget.attempt_delay()).await;
                    }
                }
                AttachOutcome::FatalFailure(e) => {
                    tracing::warn!(attempt = index, error = %e, "Connection attempt #{} failed fatally", index);
                    return AttachResult::Aborted {
                        attempts: attempt,
                        cause: e,
                    };
                }
            }
        }

        tracing::warn!(attempts = attempt, "All attempts to connect to the target failed");
        AttachResult::Exhausted {
            attempts: attempt,
            last_error,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connector::{ConnectorArgument, TargetInfo, ENDPOINT_ARGUMENT};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Connection that does nothing, for tests
    pub(crate) struct NullConnection {
        pub target: TargetInfo,
        pub init_ok: bool,
    }

    impl NullConnection {
        pub fn boxed(init_ok: bool) -> Box<dyn Connection> {
            Box::new(Self {
                target: TargetInfo {
                    name: "null".into(),
                    version: "0".into(),
                    description: "null target".into(),
                },
                init_ok,
            })
        }
    }

    #[async_trait]
    impl Connection for NullConnection {
        fn target(&self) -> &TargetInfo {
            &self.target
        }

        async fn wait_for_init(&mut self) -> Result<()> {
            if self.init_ok {
                Ok(())
            } else {
                std::future::pending().await
            }
        }

        async fn resume(&mut self) -> Result<()> {
            Ok(())
        }

        async fn dispose(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Scripted attach step
    #[derive(Clone, Copy)]
    pub(crate) enum Step {
        Refused,
        Illegal,
        Broken,
        Accept,
    }

    /// Connector that replays a script of attach results and counts calls
    pub(crate) struct ScriptedConnector {
        pub script: Mutex<VecDeque<Step>>,
        pub calls: AtomicUsize,
        pub declare_endpoint: bool,
        pub supported: bool,
    }

    impl ScriptedConnector {
        pub fn new(steps: &[Step]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                declare_endpoint: true,
                supported: true,
            })
        }

        pub fn without_endpoint(steps: &[Step]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                declare_endpoint: false,
                supported: true,
            })
        }

        /// Connector that reports itself unavailable on this platform
        pub fn unsupported(steps: &[Step]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                declare_endpoint: true,
                supported: false,
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn description(&self) -> &str {
            "Replays scripted attach results"
        }

        fn transport(&self) -> &str {
            "none"
        }

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn default_arguments(&self) -> ArgumentSet {
            let args = ArgumentSet::new().declare(ConnectorArgument::optional("retries", "", None));
            if self.declare_endpoint {
                args.declare(ConnectorArgument::required(ENDPOINT_ARGUMENT, "Endpoint"))
            } else {
                args
            }
        }

        async fn attach(&self, _arguments: &ArgumentSet) -> Result<Box<dyn Connection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Refused);
            match step {
                Step::Refused => Err(Error::ConnectionFailed(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "not listening yet",
                ))),
                Step::Illegal => Err(Error::IllegalArguments("bad endpoint".into())),
                Step::Broken => Err(Error::Protocol("garbage".into())),
                Step::Accept => Ok(NullConnection::boxed(true)),
            }
        }
    }

    #[test]
    fn test_budget_floor_division() {
        let budget = RetryBudget::new(100, 350).unwrap();
        assert_eq!(budget.max_attempts(), 3);
        assert_eq!(budget.attempt_delay(), Duration::from_millis(100));

        assert_eq!(RetryBudget::new(4000, 5 * 60 * 1000).unwrap().max_attempts(), 75);
        assert_eq!(RetryBudget::new(1000, 999).unwrap().max_attempts(), 0);
        assert_eq!(RetryBudget::new(7, 0).unwrap().max_attempts(), 0);
    }

    #[test]
    fn test_budget_rejects_non_positive_delay() {
        assert!(matches!(RetryBudget::new(0, 1000), Err(Error::Config(_))));
        assert!(matches!(RetryBudget::new(-5, 1000), Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_on_third_attempt_after_two_sleeps() {
        let connector = ScriptedConnector::new(&[Step::Refused, Step::Refused, Step::Accept]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(100, 350).unwrap());
        let args = connector.default_arguments();

        let start = tokio::time::Instant::now();
        let result = supervisor.attach(connector.as_ref(), &args).await;
        let elapsed = start.elapsed();

        assert_eq!(result.state(), SupervisorState::Connected);
        assert_eq!(result.attempts(), 3);
        assert_eq!(connector.calls(), 3);
        assert!(elapsed >= Duration::from_millis(200), "slept {elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "slept {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_does_not_sleep() {
        let connector = ScriptedConnector::new(&[Step::Accept]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(1000, 10_000).unwrap());
        let args = connector.default_arguments();

        let start = tokio::time::Instant::now();
        let result = supervisor.attach(connector.as_ref(), &args).await;

        assert_eq!(result.attempts(), 1);
        assert!(result.into_connection().is_ok());
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_on_transient_failures() {
        let connector = ScriptedConnector::new(&[]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(100, 550).unwrap());
        let args = connector.default_arguments();

        let start = tokio::time::Instant::now();
        let result = supervisor.attach(connector.as_ref(), &args).await;
        let elapsed = start.elapsed();

        assert_eq!(result.state(), SupervisorState::Exhausted);
        assert_eq!(result.attempts(), 5);
        assert_eq!(connector.calls(), 5);
        // four sleeps between five attempts
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(500));

        match result {
            AttachResult::Exhausted { last_error, .. } => {
                assert!(last_error.unwrap().is_transient());
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_maps_to_attach_exhausted_error() {
        let connector = ScriptedConnector::new(&[]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(100, 200).unwrap());
        let args = connector.default_arguments();

        let err = supervisor
            .attach(connector.as_ref(), &args)
            .await
            .into_connection()
            .err()
            .unwrap();
        assert!(matches!(err, Error::AttachExhausted { attempts: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_aborts_without_using_budget() {
        let connector = ScriptedConnector::new(&[Step::Illegal, Step::Accept]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(100, 1000).unwrap());
        let args = connector.default_arguments();

        let start = tokio::time::Instant::now();
        let result = supervisor.attach(connector.as_ref(), &args).await;

        assert_eq!(result.state(), SupervisorState::Aborted);
        assert_eq!(result.attempts(), 1);
        assert_eq!(connector.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            result.into_connection().err().unwrap(),
            Error::IllegalArguments(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_error_after_transient_aborts() {
        let connector = ScriptedConnector::new(&[Step::Refused, Step::Broken, Step::Accept]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(100, 1000).unwrap());
        let args = connector.default_arguments();

        let result = supervisor.attach(connector.as_ref(), &args).await;

        assert_eq!(result.state(), SupervisorState::Aborted);
        assert_eq!(result.attempts(), 2);
        assert_eq!(connector.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_makes_no_attempts() {
        let connector = ScriptedConnector::new(&[Step::Accept]);
        let supervisor = AttachSupervisor::new(RetryBudget::new(1000, 500).unwrap());
        let args = connector.default_arguments();

        let result = supervisor.attach(connector.as_ref(), &args).await;

        assert_eq!(result.state(), SupervisorState::Exhausted);
        assert_eq!(result.attempts(), 0);
        assert_eq!(connector.calls(), 0);
    }

    #[test]
    fn test_classify() {
        let refused = Err(Error::ConnectionFailed(io::Error::from(io::ErrorKind::NotFound)));
        assert!(matches!(AttachOutcome::classify(refused), AttachOutcome::TransientFailure(_)));

        let illegal = Err(Error::IllegalArguments("x".into()));
        assert!(matches!(AttachOutcome::classify(illegal), AttachOutcome::FatalFailure(_)));

        let ok = Ok(NullConnection::boxed(true));
        assert!(matches!(AttachOutcome::classify(ok), AttachOutcome::Connected(_)));
    }
}
