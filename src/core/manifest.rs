//! Declaration arguments and the `modbuild.toml` manifest.
//!
//! Each declaration operation on the target graph takes an explicit argument
//! struct. The same structs are what a manifest deserializes into:
//!
//! ```toml
//! [[module]]
//! name = "sys"
//! module_deps = "except str"
//!
//! [[program]]
//! name = "tool"
//! module_deps = ["sys"]
//! ```
//!
//! Word-list fields accept either a whitespace-separated string or an array.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::target::Language;

/// Default manifest file name.
pub const MANIFEST_NAME: &str = "modbuild.toml";

#[derive(Deserialize)]
#[serde(untagged)]
enum Words {
    One(String),
    Many(Vec<String>),
}

fn words<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Words::deserialize(deserializer)? {
        Words::One(s) => s.split_whitespace().map(String::from).collect(),
        Words::Many(v) => v,
    })
}

fn opt_words<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    words(deserializer).map(Some)
}

/// Arguments for `declare_module`: a library plus co-located tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleArgs {
    /// Module name (required)
    pub name: String,
    /// Source language, default C++
    pub lang: Language,
    /// Module directory, relative to the project root
    #[serde(alias = "dir")]
    pub path: Option<PathBuf>,
    /// Source directory, relative to the module directory
    #[serde(alias = "sourcedir")]
    pub source_dir: Option<PathBuf>,
    /// Glob matched against source file names
    pub source_filter: Option<String>,
    /// Names of other modules this one depends on
    #[serde(deserialize_with = "words")]
    pub module_deps: Vec<String>,
    /// Fully-qualified local target identities
    #[serde(deserialize_with = "words")]
    pub uselib_local: Vec<String>,
    /// External library tokens
    #[serde(deserialize_with = "words")]
    pub uselib: Vec<String>,
    /// Private include directories (default `include`)
    #[serde(deserialize_with = "opt_words")]
    pub includes: Option<Vec<String>>,
    /// Exported include directories (default `include`)
    #[serde(deserialize_with = "opt_words")]
    pub export_includes: Option<Vec<String>>,
    /// Extra define tokens
    #[serde(deserialize_with = "words")]
    pub defines: Vec<String>,
    /// Library version string
    pub version: Option<String>,
    /// Only install headers, build no library
    pub headersonly: bool,
    /// Module deps for `tests/` programs (defaults to `module_deps`)
    #[serde(deserialize_with = "opt_words")]
    pub test_deps: Option<Vec<String>>,
    /// Glob matched against `tests/` file names
    pub test_filter: Option<String>,
    /// Uselib tokens for `tests/` programs (defaults to `uselib`)
    #[serde(deserialize_with = "opt_words")]
    pub test_uselib: Option<Vec<String>>,
    /// Local target identities for `tests/` programs
    #[serde(deserialize_with = "words")]
    pub test_uselib_local: Vec<String>,
    /// Glob matched against `unittests/` file names
    pub unittest_filter: Option<String>,
    /// Variant to build in (defaults to the configured variant)
    pub variant: Option<String>,
}

/// Arguments for `declare_plugin`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginArgs {
    /// Plugin name (required)
    pub name: String,
    /// Plugin type; selects the install location
    pub plugin: String,
    pub lang: Language,
    #[serde(alias = "dir")]
    pub path: Option<PathBuf>,
    /// Explicit source files, relative to the plugin directory
    #[serde(deserialize_with = "words")]
    pub source: Vec<String>,
    #[serde(alias = "sourcedir")]
    pub source_dir: Option<PathBuf>,
    pub source_filter: Option<String>,
    #[serde(deserialize_with = "words")]
    pub module_deps: Vec<String>,
    #[serde(deserialize_with = "words")]
    pub uselib_local: Vec<String>,
    #[serde(deserialize_with = "words")]
    pub uselib: Vec<String>,
    #[serde(deserialize_with = "opt_words")]
    pub includes: Option<Vec<String>>,
    #[serde(deserialize_with = "opt_words")]
    pub export_includes: Option<Vec<String>>,
    #[serde(deserialize_with = "words")]
    pub defines: Vec<String>,
    pub variant: Option<String>,
}

/// Arguments for `declare_program`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramArgs {
    /// Program name (required)
    pub name: String,
    pub lang: Language,
    #[serde(alias = "dir")]
    pub path: Option<PathBuf>,
    #[serde(deserialize_with = "words")]
    pub source: Vec<String>,
    #[serde(alias = "sourcedir")]
    pub source_dir: Option<PathBuf>,
    pub source_filter: Option<String>,
    #[serde(deserialize_with = "words")]
    pub module_deps: Vec<String>,
    #[serde(deserialize_with = "words")]
    pub uselib_local: Vec<String>,
    #[serde(deserialize_with = "words")]
    pub uselib: Vec<String>,
    #[serde(deserialize_with = "opt_words")]
    pub includes: Option<Vec<String>>,
    #[serde(deserialize_with = "words")]
    pub defines: Vec<String>,
    /// Install directory relative to the prefix (default `bin`)
    pub install_path: Option<PathBuf>,
    /// Do not install the program
    pub no_install: bool,
    pub variant: Option<String>,
}

/// Arguments for `declare_unit_test`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTestArgs {
    /// Test source file, relative to the test directory (required)
    pub test: String,
    pub lang: Language,
    #[serde(alias = "dir")]
    pub path: Option<PathBuf>,
    #[serde(deserialize_with = "words")]
    pub module_deps: Vec<String>,
    #[serde(deserialize_with = "words")]
    pub uselib: Vec<String>,
    /// Exclude from automatic execution after the build
    pub disabled: bool,
    pub variant: Option<String>,
}

/// A build description: the declarations of one project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    #[serde(rename = "module")]
    pub modules: Vec<ModuleArgs>,
    #[serde(rename = "plugin")]
    pub plugins: Vec<PluginArgs>,
    #[serde(rename = "program")]
    pub programs: Vec<ProgramArgs>,
    #[serde(rename = "unittest")]
    pub unittests: Vec<UnitTestArgs>,
}

impl Manifest {
    /// Parse a manifest from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse manifest")
    }

    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_word_lists() {
        let manifest = Manifest::parse(
            r#"
            [[module]]
            name = "sys"
            module_deps = "except str"
            uselib = ["THREAD", "DL"]
            version = "1.0-beta"

            [[module]]
            name = "mt"
            lang = "c"
            dir = "modules/mt"

            [[program]]
            name = "tool"
            module_deps = "sys"
            "#,
        )
        .unwrap();

        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[0].module_deps, vec!["except", "str"]);
        assert_eq!(manifest.modules[0].uselib, vec!["THREAD", "DL"]);
        assert_eq!(manifest.modules[0].lang, Language::Cxx);
        assert_eq!(manifest.modules[1].lang, Language::C);
        assert_eq!(manifest.modules[1].path, Some(PathBuf::from("modules/mt")));
        assert!(manifest.modules[1].includes.is_none());
        assert_eq!(manifest.programs[0].module_deps, vec!["sys"]);
    }

    #[test]
    fn test_parse_unittest_and_plugin() {
        let manifest = Manifest::parse(
            r#"
            [[plugin]]
            name = "nitf"
            plugin = "io"
            source = "a.cpp b.cpp"

            [[unittest]]
            test = "test_buffer.cpp"
            disabled = true
            "#,
        )
        .unwrap();

        assert_eq!(manifest.plugins[0].source, vec!["a.cpp", "b.cpp"]);
        assert_eq!(manifest.plugins[0].plugin, "io");
        assert!(manifest.unittests[0].disabled);
    }
}
