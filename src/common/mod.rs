//! Common utilities shared by the harness and the mock target

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
