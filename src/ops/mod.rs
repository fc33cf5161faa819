//! High-level operations.
//!
//! This module contains the implementation of modbuild commands.

pub mod configure;
pub mod header;
pub mod plan;
pub mod test_runner;

pub use configure::{configure, configure_with, Configuration, ConfigureOptions};
pub use header::{comment_undefs, render_header, write_header};
pub use plan::{build_graph, plan, plan_graph, BuildPlan, InstallStep, PlannedTarget};
pub use test_runner::{run_post_build_actions, run_tests, TestCase, TestSummary};
