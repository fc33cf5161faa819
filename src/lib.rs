//! modbuild - target-graph and toolchain configuration for C/C++ module builds
//!
//! This crate provides platform and compiler detection, variant
//! configuration, target declaration, static link ordering and unit test
//! execution for projects laid out as modules.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for modbuild unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a scripted probe runner and on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::{resolve_link_order, LinkOrder, TargetGraph, Variant};
pub use core::{Environment, Manifest, Platform, Target, TargetId, TargetKind};
pub use ops::{BuildPlan, Configuration};
