//! Configuration file support for modbuild.
//!
//! Two configuration file locations are read:
//! - Global: `~/.modbuild/config.toml` - User-wide defaults
//! - Project: `.modbuild/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.
//!
//! ```toml
//! [build]
//! debug = true
//! optz = "fast"
//! build_dir = "out"
//!
//! [flags]
//! cxxflags = "-fno-strict-aliasing"
//! defs = "USE_LOGGING,LEVEL=2"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// modbuild configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Variant and graph settings
    pub build: BuildConfig,

    /// Extra compiler and linker flags
    pub flags: FlagsConfig,
}

/// Variant and graph-construction settings. Unset fields defer to the
/// next layer down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub warnings: Option<bool>,
    pub debug: Option<bool>,
    /// Pass the compiler's verbose flag on every compile
    pub verbose: Option<bool>,
    /// Optimization level: med, fast or fastest
    pub optz: Option<String>,
    pub enable64: Option<bool>,
    pub enable32: Option<bool>,
    /// Build module libraries as shared libraries
    pub shared: Option<bool>,
    /// Create unversioned symlinks for versioned libraries
    pub symlinks: Option<bool>,
    /// Run unit tests after the build
    pub unittests: Option<bool>,
    /// Skip building the programs under `tests/`
    pub libs_only: Option<bool>,
    /// Look for doxygen
    pub doxygen: Option<bool>,
    /// Install prefix
    pub prefix: Option<PathBuf>,
    /// Build output directory
    pub build_dir: Option<PathBuf>,
    /// Windows C runtime: MT or MD
    pub crt: Option<String>,
    /// Platform id override
    pub platform: Option<String>,
}

/// Extra flags appended to every variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    pub cflags: Option<String>,
    pub cxxflags: Option<String>,
    pub linkflags: Option<String>,
    /// Comma-separated define tokens
    pub defs: Option<String>,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr; $($field:ident),* $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )*
    };
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        merge_fields!(self.build, other.build;
            warnings, debug, verbose, optz, enable64, enable32, shared, symlinks,
            unittests, libs_only, doxygen, prefix, build_dir, crt, platform);
        merge_fields!(self.flags, other.flags; cflags, cxxflags, linkflags, defs);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.modbuild/config.toml)
/// 2. Global config (~/.modbuild/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }
    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global modbuild config directory (~/.modbuild).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".modbuild"))
}

/// Get the global config path (~/.modbuild/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.modbuild/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".modbuild").join("config.toml")
}
