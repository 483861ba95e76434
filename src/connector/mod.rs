//! Connectors: named strategies for establishing a control channel to a target
//!
//! The harness only relies on the two traits below; how a connector reaches
//! its target is its own business.

pub mod arguments;
pub mod local;
pub mod protocol;
pub mod registry;
pub mod transport;

use async_trait::async_trait;

use crate::common::Result;

pub use arguments::{bind_endpoint, ArgumentSet, ConnectorArgument, ENDPOINT_ARGUMENT};
pub use protocol::TargetInfo;
pub use registry::ConnectorRegistry;

/// A strategy for attaching to a target process
#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique connector name used for lookup
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Name of the underlying transport
    fn transport(&self) -> &str;

    /// Whether this connector works on the current platform
    fn is_supported(&self) -> bool {
        true
    }

    /// Declared arguments with their default values
    fn default_arguments(&self) -> ArgumentSet;

    /// Make one attempt to attach to the target
    ///
    /// Fails with `Error::ConnectionFailed` when the target is not reachable
    /// (yet), and with `Error::IllegalArguments` when `arguments` are unusable.
    async fn attach(&self, arguments: &ArgumentSet) -> Result<Box<dyn Connection>>;
}

/// An established control channel to a target
#[async_trait]
pub trait Connection: Send {
    /// Identity reported by the target when the channel was established
    fn target(&self) -> &TargetInfo;

    /// Block until the target reports that it finished initializing
    async fn wait_for_init(&mut self) -> Result<()>;

    /// Let the target run past its initialization point
    async fn resume(&mut self) -> Result<()>;

    /// Tell the target we're detaching; best effort
    async fn dispose(&mut self) -> Result<()>;
}
