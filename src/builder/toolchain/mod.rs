//! Toolchain detection and the per-platform flag matrix.
//!
//! Compiler detection priority:
//! 1. Environment variables (CC, CXX)
//! 2. Auto-detection (searching PATH for common compilers)
//!
//! Flags are then selected from a static rule table keyed by platform
//! family and compiler family (see [`rules_for`]).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod detect;
mod matrix;

pub use detect::{detect_compiler, detect_compiler_family};
pub use matrix::{rules_for, Crt, LanguageRules, MatrixOptions, OptzLevel, ToolchainRule};

/// Errors that abort configuration.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Unable to find C/C++ compiler")]
    NoCompiler,

    #[error("OS/platform currently unsupported: {0}")]
    UnsupportedPlatform(String),

    #[error("mandatory check failed: library `{lib}` is required on {platform}")]
    MandatoryProbeFailed { lib: String, platform: String },
}

/// The family of a compiler, which selects its flag dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerFamily {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Sun/Oracle Studio (`suncc` / `sunCC`)
    SunStudio,
    /// Microsoft Visual C++
    Msvc,
}

impl CompilerFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFamily::Gcc => "gcc",
            CompilerFamily::Clang => "clang",
            CompilerFamily::AppleClang => "apple-clang",
            CompilerFamily::SunStudio => "sun",
            CompilerFamily::Msvc => "msvc",
        }
    }

    /// Whether the compiler accepts GCC-style flags.
    pub fn is_gnu_like(&self) -> bool {
        matches!(
            self,
            CompilerFamily::Gcc | CompilerFamily::Clang | CompilerFamily::AppleClang
        )
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected C/C++ compiler pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Compiler family
    pub family: CompilerFamily,
}

impl Compiler {
    pub fn new(cc: impl Into<PathBuf>, cxx: impl Into<PathBuf>, family: CompilerFamily) -> Self {
        Compiler {
            cc: cc.into(),
            cxx: cxx.into(),
            family,
        }
    }

    pub fn path_for(&self, lang: crate::core::Language) -> &Path {
        match lang {
            crate::core::Language::C => &self.cc,
            crate::core::Language::Cxx => &self.cxx,
        }
    }
}
