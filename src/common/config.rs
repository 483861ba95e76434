//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Placeholder in target arguments that is replaced by the endpoint identifier
pub const ENDPOINT_PLACEHOLDER: &str = "{endpoint}";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Attach loop settings
    #[serde(default)]
    pub attach: AttachConfig,

    /// Target process settings
    #[serde(default)]
    pub target: TargetConfig,

    /// Verdict settings
    #[serde(default)]
    pub verdict: VerdictConfig,
}

/// Attach loop settings
#[derive(Debug, Deserialize)]
pub struct AttachConfig {
    /// Name of the connector to look up in the registry
    #[serde(default = "default_connector")]
    pub connector: String,

    /// Delay between connection attempts
    #[serde(default = "default_attempt_delay")]
    pub attempt_delay_ms: i64,

    /// Overall wait time; bounds the attach loop and each lifecycle wait
    #[serde(default = "default_wait_time")]
    pub wait_time_minutes: u64,

    /// Per-attempt handshake timeout passed to the connector
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            connector: default_connector(),
            attempt_delay_ms: default_attempt_delay(),
            wait_time_minutes: default_wait_time(),
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

fn default_connector() -> String {
    "local-socket-attach".to_string()
}
fn default_attempt_delay() -> i64 {
    4000
}
fn default_wait_time() -> u64 {
    5
}
fn default_handshake_timeout() -> u64 {
    5000
}

impl AttachConfig {
    /// Total wait time in milliseconds
    pub fn wait_time_ms(&self) -> u64 {
        self.wait_time_minutes.saturating_mul(60 * 1000)
    }
}

/// Target process settings
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    /// Program to launch; bare names are resolved through PATH
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Arguments; `{endpoint}` is replaced by the endpoint identifier
    #[serde(default = "default_target_args")]
    pub args: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_target_args(),
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("mock-debuggee")
}

fn default_target_args() -> Vec<String> {
    vec!["--address".to_string(), ENDPOINT_PLACEHOLDER.to_string()]
}

impl TargetConfig {
    /// Target arguments with the endpoint placeholder substituted
    pub fn args_for(&self, endpoint: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(ENDPOINT_PLACEHOLDER, endpoint))
            .collect()
    }
}

/// Verdict settings
#[derive(Debug, Deserialize)]
pub struct VerdictConfig {
    /// Offset added to pass/fail codes, both for the target's expected
    /// exit code and for our own exit code
    #[serde(default = "default_status_base")]
    pub status_base: i32,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            status_base: default_status_base(),
        }
    }
}

fn default_status_base() -> i32 {
    95
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.attach.connector, "local-socket-attach");
        assert_eq!(config.attach.attempt_delay_ms, 4000);
        assert_eq!(config.attach.wait_time_ms(), 5 * 60 * 1000);
        assert_eq!(config.verdict.status_base, 95);
        assert_eq!(config.target.args, vec!["--address", "{endpoint}"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
[attach]
attempt_delay_ms = 250

[target]
program = "/opt/target/bin/run"
args = ["-Xaddress={endpoint}", "--quiet"]
"#,
        )
        .unwrap();

        assert_eq!(config.attach.attempt_delay_ms, 250);
        assert_eq!(config.attach.wait_time_minutes, 5);
        assert_eq!(config.target.program, PathBuf::from("/opt/target/bin/run"));
        assert_eq!(
            config.target.args_for("ep-1"),
            vec!["-Xaddress=ep-1", "--quiet"]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verdict]\nstatus_base = 10").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.verdict.status_base, 10);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::parse("[attach\nconnector = 1").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/attach-harness.toml")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
