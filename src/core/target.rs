//! Target definitions - what gets built.
//!
//! A Target is one declared build unit: a static or shared library, a
//! program, or a unit test. Targets are registered into the
//! [`TargetGraph`](crate::builder::graph::TargetGraph) by the declaration
//! operations and consumed by the external build engine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::env::Environment;

/// The kind of target being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Static library (.a / .lib)
    #[default]
    #[serde(alias = "staticlib", alias = "static")]
    StaticLib,

    /// Shared/dynamic library (.so / .dylib / .dll)
    #[serde(alias = "sharedlib", alias = "shlib")]
    SharedLib,

    /// Executable program
    Program,

    /// Unit-test executable
    Test,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::StaticLib => "staticlib",
            TargetKind::SharedLib => "sharedlib",
            TargetKind::Program => "program",
            TargetKind::Test => "test",
        }
    }

    /// Whether the artifact fully resolves its own static dependencies
    /// when it is linked.
    pub fn encapsulates_static_deps(&self) -> bool {
        !matches!(self, TargetKind::StaticLib)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language of a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[default]
    #[serde(rename = "c++", alias = "cxx", alias = "cpp")]
    Cxx,
}

impl Language {
    /// Suffix used in target identities (`name-c`, `name-c++`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }

    /// Extension of test sources discovered in `tests/` and `unittests/`.
    pub fn test_extension(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "cpp",
        }
    }

    /// Extensions picked up by default source discovery.
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Language::C => &["c"],
            Language::Cxx => &["cpp", "cc", "cxx", "c"],
        }
    }

    /// Qualify a declared name into a target identity.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}-{}", name, self.suffix())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Language::C),
            "c++" | "cxx" | "cpp" => Ok(Language::Cxx),
            other => Err(format!("unknown language `{}`, expected `c` or `c++`", other)),
        }
    }
}

/// Identity of a target in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        TargetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        TargetId(s.to_string())
    }
}

/// A file to be installed under the install prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallEntry {
    /// Source file (absolute)
    pub source: PathBuf,
    /// Destination directory, relative to the install prefix
    pub dest_dir: PathBuf,
}

/// A symlink to be created under the install prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkEntry {
    /// Link path, relative to the install prefix
    pub link: PathBuf,
    /// File name the link points at
    pub points_to: String,
}

/// Computed link inputs for a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInputs {
    /// Local static libraries, in single-pass linker order
    pub static_libs: Vec<String>,
    /// Local shared libraries the target links against
    pub shared_libs: Vec<String>,
    /// System libraries from uselib tokens
    pub system_libs: Vec<String>,
}

/// A declared build target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Identity in the graph
    pub id: TargetId,
    /// What kind of artifact to produce
    pub kind: TargetKind,
    /// Source language
    pub lang: Language,
    /// Base name of the produced artifact (may carry a version)
    pub artifact: String,
    /// Directory the target was declared in
    pub path: PathBuf,
    /// Source files
    pub sources: Vec<PathBuf>,
    /// Private include directories
    pub includes: Vec<PathBuf>,
    /// Include directories exported to dependents
    pub export_includes: Vec<PathBuf>,
    /// Compiler define tokens (environment defines plus target defines)
    pub defines: Vec<String>,
    /// Declared local dependency identities
    pub deps: Vec<TargetId>,
    /// External uselib tokens
    pub uselib: Vec<String>,
    /// Install directory relative to the prefix, if installed
    pub install_path: Option<PathBuf>,
    /// Version string, if any
    pub version: Option<String>,
    /// Private copy of the variant environment
    pub env: Environment,
    /// Link inputs computed once the graph is complete
    #[serde(default)]
    pub link: LinkInputs,
}

impl Target {
    /// Output file name of this target on a given platform.
    pub fn output_filename(&self, platform: &crate::core::Platform) -> String {
        platform.artifact_filename(self.kind, &self.artifact)
    }

    /// Whether the target uses a given uselib token.
    pub fn uses(&self, token: &str) -> bool {
        self.uselib.iter().any(|u| u == token)
    }

    /// Compile flags for this target: the environment's flags for its
    /// language, plus thread and shared-library flags where they apply.
    pub fn compile_flags(&self) -> Vec<String> {
        let lang = self.env.lang(self.lang);
        let mut flags: Vec<String> = lang.flags.as_slice().to_vec();
        if self.uses("THREAD") {
            flags.extend(lang.thread_flags.iter().map(String::from));
        }
        if self.kind == TargetKind::SharedLib {
            flags.extend(lang.shlib_flags.iter().map(String::from));
        }
        flags
    }
}
