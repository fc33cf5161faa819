//! Configuration environments.
//!
//! An [`Environment`] is the bag of flags, defines and library tokens that a
//! build variant carries. Flag order matters to compilers and linkers, so all
//! accumulators preserve insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::target::{Language, TargetKind};

/// An ordered list of command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagList(Vec<String>);

impl FlagList {
    pub fn new() -> Self {
        FlagList(Vec::new())
    }

    /// Append flags. Empty strings are dropped so that "no flag" rule
    /// entries can be appended unconditionally.
    pub fn append<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .extend(flags.into_iter().map(Into::into).filter(|f| !f.is_empty()));
    }

    /// Append flags that are not already present.
    pub fn append_unique<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            let flag = flag.into();
            if !flag.is_empty() && !self.0.contains(&flag) {
                self.0.push(flag);
            }
        }
    }

    /// Append the whitespace-separated words of `flags`.
    pub fn append_words(&mut self, flags: &str) {
        self.append(flags.split_whitespace());
    }

    pub fn extend_from(&mut self, other: &FlagList) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FlagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = FlagList::new();
        list.append(iter);
        list
    }
}

impl fmt::Display for FlagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Value recorded for a define by a feature probe or by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl DefineValue {
    /// Parse a probe-reported value: integers, then `True`/`False`,
    /// otherwise the trimmed raw string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return DefineValue::Int(n);
        }
        match raw {
            "True" => DefineValue::Bool(true),
            "False" => DefineValue::Bool(false),
            other => DefineValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            DefineValue::Int(n) => write!(f, "{}", n),
            DefineValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DefineValue {
    fn from(n: i64) -> Self {
        DefineValue::Int(n)
    }
}

impl From<i32> for DefineValue {
    fn from(n: i32) -> Self {
        DefineValue::Int(n.into())
    }
}

impl From<bool> for DefineValue {
    fn from(b: bool) -> Self {
        DefineValue::Bool(b)
    }
}

impl From<&str> for DefineValue {
    fn from(s: &str) -> Self {
        DefineValue::Text(s.to_string())
    }
}

/// An insertion-ordered map of define name to optional value.
///
/// A `None` value records an explicit absence (a probe that failed); such
/// entries are never emitted as compiler defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefineMap(Vec<(String, Option<DefineValue>)>);

impl DefineMap {
    pub fn new() -> Self {
        DefineMap(Vec::new())
    }

    /// Set a define, replacing any previous value in place.
    pub fn define(&mut self, key: impl Into<String>, value: impl Into<DefineValue>) {
        self.set(key.into(), Some(value.into()));
    }

    /// Record that a define is absent.
    pub fn undefine(&mut self, key: impl Into<String>) {
        self.set(key.into(), None);
    }

    fn set(&mut self, key: String, value: Option<DefineValue>) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DefineValue> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&DefineValue>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the defined entries as compiler define tokens.
    ///
    /// Keys prefixed `HAVE_` or `USE_` are emitted bare; everything else is
    /// emitted as `KEY=VALUE`. Absent entries are skipped.
    pub fn to_tokens(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                let value = value.as_ref()?;
                if key.starts_with("HAVE_") || key.starts_with("USE_") {
                    Some(key.clone())
                } else {
                    Some(format!("{}={}", key, value))
                }
            })
            .collect()
    }
}

/// Flags and defines that belong to one compiler family (C or C++).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageFlags {
    /// Compile flags (`CCFLAGS` / `CXXFLAGS`)
    pub flags: FlagList,
    /// Preprocessor defines passed on every compile line
    pub defines: FlagList,
    /// Flags added for units that use the `THREAD` token
    pub thread_flags: FlagList,
    /// Flags added when compiling objects for a shared library
    pub shlib_flags: FlagList,
}

/// The configuration bag of one build variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Variant name this environment is frozen under, if any
    pub variant: Option<String>,
    /// Platform id the environment was configured for
    pub platform: String,
    /// C compiler flags
    pub c: LanguageFlags,
    /// C++ compiler flags
    pub cxx: LanguageFlags,
    /// Linker flags
    pub link_flags: FlagList,
    /// Defines accumulated by feature probes and configuration
    pub defines: DefineMap,
    /// Uselib token to system library names (e.g. `THREAD` -> `pthread`)
    pub libs: BTreeMap<String, Vec<String>>,
    /// Kind used for module libraries
    pub lib_type: TargetKind,
    /// Whether the variant builds 64-bit code
    pub is_64bit: bool,
    /// Path to doxygen, if requested and found
    pub doxygen: Option<PathBuf>,
}

impl Environment {
    pub fn new(platform: impl Into<String>) -> Self {
        Environment {
            platform: platform.into(),
            lib_type: TargetKind::StaticLib,
            ..Environment::default()
        }
    }

    pub fn lang(&self, lang: Language) -> &LanguageFlags {
        match lang {
            Language::C => &self.c,
            Language::Cxx => &self.cxx,
        }
    }

    pub fn lang_mut(&mut self, lang: Language) -> &mut LanguageFlags {
        match lang {
            Language::C => &mut self.c,
            Language::Cxx => &mut self.cxx,
        }
    }

    /// Register system libraries behind a uselib token.
    pub fn add_libs<I, S>(&mut self, token: &str, libs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.libs.entry(token.to_string()).or_default();
        for lib in libs {
            let lib = lib.into();
            if !entry.contains(&lib) {
                entry.push(lib);
            }
        }
    }

    /// System libraries for a list of uselib tokens, in token order.
    /// Unknown tokens contribute nothing.
    pub fn libs_for(&self, tokens: &[String]) -> Vec<String> {
        let mut libs = Vec::new();
        for token in tokens {
            if let Some(names) = self.libs.get(token) {
                for name in names {
                    if !libs.contains(name) {
                        libs.push(name.clone());
                    }
                }
            }
        }
        libs
    }

    /// Filtered define tokens for targets built in this environment.
    pub fn define_tokens(&self) -> Vec<String> {
        self.defines.to_tokens()
    }
}
