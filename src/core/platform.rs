//! Host platform identification.
//!
//! A platform is identified by an opaque string (usually a GNU triple printed
//! by `config.guess`, or a short OS name like `linux` or `win32`). The string
//! is classified once into a closed [`PlatformFamily`] that drives which
//! toolchain rules apply.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::target::TargetKind;

static APPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(i.86-apple-.*|x86_64-apple-.*|aarch64-apple-.*|arm64-apple-.*|darwin)")
        .expect("valid apple regex")
});

static LINUX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*-.*-linux-.*|i686-pc-.*|linux)").expect("valid linux regex")
});

static SOLARIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(sparc-sun.*|solaris|sunos)").expect("valid solaris regex"));

static WINDOWS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^win32").expect("valid windows regex"));

/// Platform family a platform id is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Apple,
    Linux,
    Solaris,
    Windows,
    Unknown,
}

impl PlatformFamily {
    /// Classify a raw platform id.
    ///
    /// Classifiers are tried in a fixed order (apple, linux, solaris, windows),
    /// each anchored at the start of the id.
    pub fn classify(id: &str) -> Self {
        if APPLE_RE.is_match(id) {
            PlatformFamily::Apple
        } else if LINUX_RE.is_match(id) {
            PlatformFamily::Linux
        } else if SOLARIS_RE.is_match(id) {
            PlatformFamily::Solaris
        } else if WINDOWS_RE.is_match(id) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformFamily::Apple => "apple",
            PlatformFamily::Linux => "linux",
            PlatformFamily::Solaris => "solaris",
            PlatformFamily::Windows => "windows",
            PlatformFamily::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified platform id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    id: String,
    family: PlatformFamily,
}

impl Platform {
    /// Classify a platform id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let family = PlatformFamily::classify(&id);
        Platform { id, family }
    }

    /// The platform the current process reports, spelled the way
    /// platform ids are spelled elsewhere (`win32`, `darwin`, `linux`, ...).
    pub fn builtin_id() -> &'static str {
        match std::env::consts::OS {
            "windows" => "win32",
            "macos" => "darwin",
            other => other,
        }
    }

    pub fn host() -> Self {
        Self::new(Self::builtin_id())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> PlatformFamily {
        self.family
    }

    pub fn is_windows(&self) -> bool {
        self.family == PlatformFamily::Windows
    }

    /// Suffix executables carry on this platform (empty if none).
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() {
            ".exe"
        } else {
            ""
        }
    }

    /// File name of the artifact produced for `name` with the given kind.
    pub fn artifact_filename(&self, kind: TargetKind, name: &str) -> String {
        match kind {
            TargetKind::StaticLib => {
                if self.is_windows() {
                    format!("{}.lib", name)
                } else {
                    format!("lib{}.a", name)
                }
            }
            TargetKind::SharedLib => match self.family {
                PlatformFamily::Windows => format!("{}.dll", name),
                PlatformFamily::Apple => format!("lib{}.dylib", name),
                _ => format!("lib{}.so", name),
            },
            TargetKind::Program | TargetKind::Test => format!("{}{}", name, self.exe_suffix()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
