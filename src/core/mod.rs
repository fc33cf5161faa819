//! Core data structures for modbuild.
//!
//! - Platform identification and artifact naming
//! - Variant environments (flags, defines, library tokens)
//! - Targets and the declaration manifest

pub mod env;
pub mod manifest;
pub mod platform;
pub mod target;

pub use env::{DefineMap, DefineValue, Environment, FlagList, LanguageFlags};
pub use manifest::{Manifest, MANIFEST_NAME};
pub use platform::{Platform, PlatformFamily};
pub use target::{Language, Target, TargetId, TargetKind};
