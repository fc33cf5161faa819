//! Toolchain configuration and target-graph construction.
//!
//! This module turns a probed host into frozen variants, registers targets
//! against them, and orders their link inputs for the external build engine.

pub mod graph;
pub mod link_order;
pub mod probe;
pub mod toolchain;
pub mod variant;

pub use graph::{GraphError, GraphOptions, PostBuildAction, TargetGraph};
pub use link_order::{resolve_link_order, LinkOrder, LinkOrderError};
pub use probe::{
    detect_platform, run_feature_probes, CompilerProbeRunner, FeatureMap, ProbeRunner,
    ToolchainContext,
};
pub use toolchain::{detect_compiler, rules_for, Compiler, CompilerFamily, ToolchainError};
pub use variant::{freeze_variant, Variant, VariantOptions};
