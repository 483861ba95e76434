//! Attach harness - launches a target process, attaches to it over a local
//! transport with bounded retries, and validates how it exits.
//!
//! The pieces compose as: argument binding, the retry supervisor, the target
//! lifecycle, and finally the verdict.

pub mod common;
pub mod connector;
pub mod harness;
pub mod lifecycle;
pub mod supervisor;
pub mod verdict;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::Harness;
pub use verdict::{Status, Verdict};
