//! Test utilities and mocks for modbuild unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::MockProbeRunner;
//!
//! let runner = MockProbeRunner::new().fail_libs(["rt"]);
//! let features = run_feature_probes(&runner);
//! ```

pub mod fixtures;

use std::cell::RefCell;

use crate::builder::probe::{ProbeMode, ProbeOutcome, ProbeRequest, ProbeRunner};

pub use fixtures::*;

/// Scripted probe runner.
///
/// Every request succeeds unless it matches one of the configured failure
/// rules. `Run` requests print the configured output. All requests are
/// recorded for later inspection.
#[derive(Debug, Default)]
pub struct MockProbeRunner {
    fail_libs: Vec<String>,
    fail_flags: Vec<String>,
    fail_sources: Vec<String>,
    fail_all: bool,
    run_output: String,
    requests: RefCell<Vec<ProbeRequest>>,
}

impl MockProbeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner on which every probe fails.
    pub fn failing() -> Self {
        MockProbeRunner {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Fail requests that link any of these libraries.
    pub fn fail_libs<I, S>(mut self, libs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_libs.extend(libs.into_iter().map(Into::into));
        self
    }

    /// Fail requests that pass this compile or link flag.
    pub fn fail_flag(mut self, flag: impl Into<String>) -> Self {
        self.fail_flags.push(flag.into());
        self
    }

    /// Fail requests whose source contains this text.
    pub fn fail_source(mut self, needle: impl Into<String>) -> Self {
        self.fail_sources.push(needle.into());
        self
    }

    /// Standard output printed by programs that are run.
    pub fn run_output(mut self, output: impl Into<String>) -> Self {
        self.run_output = output.into();
        self
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<ProbeRequest> {
        self.requests.borrow().clone()
    }

    fn fails(&self, request: &ProbeRequest) -> bool {
        self.fail_all
            || request.libs.iter().any(|l| self.fail_libs.contains(l))
            || request
                .flags
                .iter()
                .chain(request.link_flags.iter())
                .any(|f| self.fail_flags.contains(f))
            || self
                .fail_sources
                .iter()
                .any(|needle| request.source.contains(needle.as_str()))
    }
}

impl ProbeRunner for MockProbeRunner {
    fn run(&self, request: &ProbeRequest) -> ProbeOutcome {
        self.requests.borrow_mut().push(request.clone());
        if self.fails(request) {
            return ProbeOutcome::failed();
        }
        ProbeOutcome {
            success: true,
            stdout: if request.mode == ProbeMode::Run {
                self.run_output.clone()
            } else {
                String::new()
            },
        }
    }
}
