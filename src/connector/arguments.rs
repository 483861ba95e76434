//! Connector argument sets and endpoint binding
//!
//! A connector declares the arguments it understands along with defaults.
//! The harness fills in the endpoint slot once, before the first attach
//! attempt, and treats the set as read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use crate::common::{Error, Result};

/// Well-known key of the argument that carries the endpoint identifier
pub const ENDPOINT_ARGUMENT: &str = "name";

/// A single declared connector argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorArgument {
    /// Argument key
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Whether attach requires a value
    pub required: bool,
    /// Current value, if any
    pub value: Option<String>,
}

impl ConnectorArgument {
    /// Declare a required argument with no default value
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
            value: None,
        }
    }

    /// Declare an optional argument with a default value
    pub fn optional(name: &str, description: &str, default: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
            value: default.map(str::to_string),
        }
    }
}

impl fmt::Display for ConnectorArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}=NULL", self.name),
        }
    }
}

/// Arguments keyed by name, in a stable order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentSet {
    arguments: BTreeMap<String, ConnectorArgument>,
}

impl ArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a declared argument
    pub fn declare(mut self, argument: ConnectorArgument) -> Self {
        self.arguments.insert(argument.name.clone(), argument);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConnectorArgument> {
        self.arguments.get(key)
    }

    /// Value of `key`, if declared and set
    pub fn value(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|a| a.value.as_deref())
    }

    /// Set `key` to `value` if the connector declared it; returns whether it did
    pub fn set_if_declared(&mut self, key: &str, value: &str) -> bool {
        match self.arguments.get_mut(key) {
            Some(argument) => {
                argument.value = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectorArgument> {
        self.arguments.values()
    }

    /// Check that every required argument carries a value
    pub fn validate(&self) -> Result<()> {
        match self.iter().find(|a| a.required && a.value.is_none()) {
            Some(missing) => Err(Error::IllegalArguments(format!(
                "required argument '{}' has no value",
                missing.name
            ))),
            None => Ok(()),
        }
    }
}

/// Store `endpoint` in the endpoint slot of `arguments`
///
/// Fails if the connector never declared the slot; that is a configuration
/// problem which no amount of retrying can fix.
pub fn bind_endpoint(arguments: &mut ArgumentSet, connector: &str, endpoint: &str) -> Result<()> {
    let slot = arguments
        .arguments
        .get_mut(ENDPOINT_ARGUMENT)
        .ok_or_else(|| Error::argument_not_declared(ENDPOINT_ARGUMENT, connector))?;

    slot.value = Some(endpoint.to_string());

    for argument in arguments.iter() {
        tracing::info!(connector, "argument {}", argument);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> ArgumentSet {
        ArgumentSet::new()
            .declare(ConnectorArgument::required(ENDPOINT_ARGUMENT, "Endpoint"))
            .declare(ConnectorArgument::optional("timeout", "Timeout", Some("10")))
    }

    #[test]
    fn test_bind_sets_endpoint_value() {
        let mut args = declared();
        assert!(args.validate().is_err());

        bind_endpoint(&mut args, "test", "/tmp/ep.sock").unwrap();

        assert_eq!(args.value(ENDPOINT_ARGUMENT), Some("/tmp/ep.sock"));
        assert_eq!(args.value("timeout"), Some("10"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_bind_without_declared_slot() {
        let mut args = ArgumentSet::new().declare(ConnectorArgument::required("port", "Port"));

        let err = bind_endpoint(&mut args, "tcp", "ep").unwrap_err();
        match err {
            Error::ArgumentNotDeclared { key, connector } => {
                assert_eq!(key, ENDPOINT_ARGUMENT);
                assert_eq!(connector, "tcp");
            }
            other => panic!("Expected ArgumentNotDeclared, got {other:?}"),
        }
        assert_eq!(args.value("port"), None);
    }

    #[test]
    fn test_validate_reports_missing_required() {
        let args = declared();
        let err = args.validate().unwrap_err();
        assert!(matches!(err, Error::IllegalArguments(ref m) if m.contains("'name'")));
    }

    #[test]
    fn test_display_shows_null_for_unset() {
        let arg = ConnectorArgument::required("name", "Endpoint");
        assert_eq!(arg.to_string(), "name=NULL");
        let arg = ConnectorArgument::optional("timeout", "Timeout", Some("5"));
        assert_eq!(arg.to_string(), "timeout=5");
    }
}
