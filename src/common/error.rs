//! Error types for the attach harness
//!
//! Every error carries enough context to explain a failed run on its own,
//! since the message ends up as the verdict message.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the attach harness
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Required argument '{key}' not declared by connector '{connector}'")]
    ArgumentNotDeclared { key: String, connector: String },

    #[error("No appropriate connector: {0}")]
    ConnectorNotFound(String),

    // === Attach Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] io::Error),

    #[error("Illegal connector arguments: {0}")]
    IllegalArguments(String),

    #[error("Connector protocol error: {0}")]
    Protocol(String),

    #[error("All {attempts} attempts to connect to the target failed")]
    AttachExhausted { attempts: u64 },

    // === Target Errors ===
    #[error("Failed to launch target: {0}")]
    LaunchFailed(String),

    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },

    #[error("target crashed: exit code={code}")]
    TargetExitMismatch { code: i32 },

    #[error("Target was terminated without an exit code")]
    TargetSignaled,

    #[error("Cannot {action} while target is {state}")]
    InvalidState { action: String, state: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an argument-not-declared error
    pub fn argument_not_declared(key: &str, connector: &str) -> Self {
        Self::ArgumentNotDeclared {
            key: key.to_string(),
            connector: connector.to_string(),
        }
    }

    /// Create a timeout error for a named operation
    pub fn timeout(operation: &str, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            millis,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Only connection-level failures qualify: the target may simply not be
    /// listening yet. Everything else is structural and retrying won't help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ConnectionFailed(_))
    }
}
