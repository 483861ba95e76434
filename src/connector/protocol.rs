//! Connector wire messages
//!
//! Frames carry one JSON message each (see `transport`). The harness sends
//! `ClientMessage`s, the target answers with `TargetMessage`s.

use serde::{Deserialize, Serialize};

/// Protocol revision sent in the client handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the harness to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a new connection
    Handshake { protocol_version: u32 },
    /// Let the target continue past its initialization point
    Resume,
    /// Harness is detaching; the target may drop the connection
    Dispose,
}

/// Messages sent from the target to the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetMessage {
    /// Handshake reply identifying the target
    Handshake {
        name: String,
        version: String,
        description: String,
    },
    /// Target finished initializing and is suspended until resumed
    VmInit,
    /// Free-form diagnostic text from the target
    Output { text: String },
}

/// Identity reported by the target during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tagging() {
        let json = serde_json::to_string(&ClientMessage::Handshake { protocol_version: 1 }).unwrap();
        assert_eq!(json, r#"{"type":"handshake","protocol_version":1}"#);

        let json = serde_json::to_string(&ClientMessage::Resume).unwrap();
        assert_eq!(json, r#"{"type":"resume"}"#);
    }

    #[test]
    fn test_target_message_parsing() {
        let msg: TargetMessage = serde_json::from_str(r#"{"type":"vm_init"}"#).unwrap();
        assert_eq!(msg, TargetMessage::VmInit);

        let unknown = serde_json::from_str::<TargetMessage>(r#"{"type":"vm_death"}"#);
        assert!(unknown.is_err());
    }
}
