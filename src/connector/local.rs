//! Local socket attaching connector
//!
//! Attaches to a target that listens on a Unix domain socket (or a Windows
//! named pipe) whose name is given by the `name` argument.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{ReadHalf, WriteHalf};

use crate::common::{Error, Result};

use super::arguments::{ArgumentSet, ConnectorArgument, ENDPOINT_ARGUMENT};
use super::protocol::{ClientMessage, TargetInfo, TargetMessage, PROTOCOL_VERSION};
use super::transport::{self, Stream};
use super::{Connection, Connector};

/// Argument key for the per-attempt handshake timeout
pub const HANDSHAKE_TIMEOUT_ARGUMENT: &str = "handshake_timeout_ms";

const DEFAULT_HANDSHAKE_TIMEOUT_MS: &str = "5000";

/// Connector for targets listening on a local socket
pub struct LocalSocketConnector;

impl LocalSocketConnector {
    fn handshake_timeout(arguments: &ArgumentSet) -> Result<Duration> {
        let raw = arguments
            .value(HANDSHAKE_TIMEOUT_ARGUMENT)
            .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_MS);
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                Error::IllegalArguments(format!(
                    "'{}' must be a non-negative integer, got '{}'",
                    HANDSHAKE_TIMEOUT_ARGUMENT, raw
                ))
            })
    }
}

#[async_trait]
impl Connector for LocalSocketConnector {
    fn name(&self) -> &str {
        "local-socket-attach"
    }

    fn description(&self) -> &str {
        "Attaches to a target listening on a local socket or named pipe"
    }

    fn transport(&self) -> &str {
        if cfg!(windows) {
            "named-pipe"
        } else {
            "unix-socket"
        }
    }

    fn default_arguments(&self) -> ArgumentSet {
        ArgumentSet::new()
            .declare(ConnectorArgument::required(
                ENDPOINT_ARGUMENT,
                "Name of the local socket the target listens on",
            ))
            .declare(ConnectorArgument::optional(
                HANDSHAKE_TIMEOUT_ARGUMENT,
                "Milliseconds to wait for the target's handshake reply",
                Some(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            ))
    }

    async fn attach(&self, arguments: &ArgumentSet) -> Result<Box<dyn Connection>> {
        arguments.validate()?;
        let endpoint = arguments
            .value(ENDPOINT_ARGUMENT)
            .ok_or_else(|| Error::IllegalArguments("endpoint name is required".to_string()))?;
        let handshake_timeout = Self::handshake_timeout(arguments)?;

        let stream = transport::connect(endpoint)
            .await
            .map_err(Error::ConnectionFailed)?;

        let connection = tokio::time::timeout(handshake_timeout, LocalSocketConnection::handshake(stream))
            .await
            .map_err(|_| {
                Error::ConnectionFailed(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "target did not answer the handshake",
                ))
            })??;

        Ok(Box::new(connection))
    }
}

/// Established local socket session
pub struct LocalSocketConnection {
    reader: ReadHalf<Stream>,
    writer: WriteHalf<Stream>,
    target: TargetInfo,
}

impl LocalSocketConnection {
    async fn handshake(stream: Stream) -> Result<Self> {
        let (mut reader, mut writer) = tokio::io::split(stream);

        transport::send_message(
            &mut writer,
            &ClientMessage::Handshake {
                protocol_version: PROTOCOL_VERSION,
            },
        )
        .await
        .map_err(Error::ConnectionFailed)?;

        let reply = transport::recv_message::<_, TargetMessage>(&mut reader)
            .await
            .map_err(Error::ConnectionFailed)?
            .map_err(|e| Error::Protocol(format!("Malformed handshake reply: {}", e)))?;

        let target = match reply {
            TargetMessage::Handshake {
                name,
                version,
                description,
            } => TargetInfo {
                name,
                version,
                description,
            },
            other => {
                return Err(Error::Protocol(format!(
                    "Expected handshake reply, got {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            reader,
            writer,
            target,
        })
    }

    async fn recv(&mut self) -> Result<TargetMessage> {
        transport::recv_message(&mut self.reader)
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::Protocol("Target closed the connection".to_string())
                } else {
                    Error::Io(e)
                }
            })?
            .map_err(|e| Error::Protocol(format!("Malformed message: {}", e)))
    }
}

#[async_trait]
impl Connection for LocalSocketConnection {
    fn target(&self) -> &TargetInfo {
        &self.target
    }

    async fn wait_for_init(&mut self) -> Result<()> {
        loop {
            match self.recv().await? {
                TargetMessage::VmInit => return Ok(()),
                TargetMessage::Output { text } => {
                    tracing::debug!(target_name = %self.target.name, "{}", text);
                }
                TargetMessage::Handshake { .. } => {
                    return Err(Error::Protocol("Unexpected second handshake".to_string()));
                }
            }
        }
    }

    async fn resume(&mut self) -> Result<()> {
        transport::send_message(&mut self.writer, &ClientMessage::Resume).await?;
        Ok(())
    }

    async fn dispose(&mut self) -> Result<()> {
        transport::send_message(&mut self.writer, &ClientMessage::Dispose).await?;
        Ok(())
    }
}
