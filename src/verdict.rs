//! Verdict aggregation
//!
//! Combines the attach result and the target's exit code into one pass/fail
//! verdict. Exit codes follow the usual test-harness convention: a status
//! base plus 0 for pass or 2 for fail.

use std::fmt;

use serde::Serialize;

use crate::common::Error;

/// Pass code, before the status base is added
pub const PASSED: i32 = 0;
/// Fail code, before the status base is added
pub const FAILED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASSED"),
            Self::Fail => write!(f, "FAILED"),
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: Status,
    /// Process exit code to hand back to the invoking environment
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Exit code conventions for both the target and ourselves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictPolicy {
    status_base: i32,
}

impl VerdictPolicy {
    pub fn new(status_base: i32) -> Self {
        Self { status_base }
    }

    /// Exit code a well-behaved target returns
    pub fn expected_exit_code(&self) -> i32 {
        self.status_base + PASSED
    }

    pub fn pass(&self) -> Verdict {
        Verdict {
            status: Status::Pass,
            exit_code: self.status_base + PASSED,
            message: None,
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> Verdict {
        Verdict {
            status: Status::Fail,
            exit_code: self.status_base + FAILED,
            message: Some(message.into()),
        }
    }

    /// Derive the verdict, checking the attach result first
    ///
    /// `exit_code` is `None` when the target never got to report one.
    pub fn aggregate(&self, attach: Result<(), &Error>, exit_code: Option<i32>) -> Verdict {
        if let Err(e) = attach {
            return self.fail(e.to_string());
        }

        match exit_code {
            Some(code) if code == self.expected_exit_code() => self.pass(),
            Some(code) => self.fail(Error::TargetExitMismatch { code }.to_string()),
            None => self.fail("target exit code unavailable"),
        }
    }
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self::new(95)
    }
}
