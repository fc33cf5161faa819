//! The toolchain flag matrix.
//!
//! A static rule table mapping (platform family, compiler family) to the
//! flag sets a variant is assembled from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Compiler, CompilerFamily, ToolchainError};
use crate::core::env::{FlagList, LanguageFlags};
use crate::core::{Platform, PlatformFamily};

/// Optimization level used by release builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptzLevel {
    Med,
    Fast,
    #[default]
    Fastest,
}

impl OptzLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptzLevel::Med => "med",
            OptzLevel::Fast => "fast",
            OptzLevel::Fastest => "fastest",
        }
    }
}

impl fmt::Display for OptzLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptzLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "med" => Ok(OptzLevel::Med),
            "fast" => Ok(OptzLevel::Fast),
            "fastest" => Ok(OptzLevel::Fastest),
            other => Err(format!(
                "unknown optimization level `{}`, expected med, fast or fastest",
                other
            )),
        }
    }
}

/// Windows C runtime library selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crt {
    /// Static runtime (`/MT`)
    #[default]
    MT,
    /// Dynamic runtime (`/MD`)
    MD,
}

impl Crt {
    fn flag(&self) -> &'static str {
        match self {
            Crt::MT => "/MT",
            Crt::MD => "/MD",
        }
    }

    fn debug_flag(&self) -> &'static str {
        match self {
            Crt::MT => "/MTd",
            Crt::MD => "/MDd",
        }
    }
}

impl FromStr for Crt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MT" => Ok(Crt::MT),
            "MD" => Ok(Crt::MD),
            other => Err(format!("unknown CRT `{}`, expected MT or MD", other)),
        }
    }
}

/// Options that influence rule selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixOptions {
    pub crt: Crt,
}

/// Flag sets for one compiler family, by purpose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageRules {
    pub debug: FlagList,
    pub warn: FlagList,
    pub nowarn: FlagList,
    pub verbose: FlagList,
    pub bits32: FlagList,
    pub bits64: FlagList,
    pub link32: FlagList,
    pub link64: FlagList,
    pub optz_med: FlagList,
    pub optz_fast: FlagList,
    pub optz_fastest: FlagList,
}

impl LanguageRules {
    pub fn optz(&self, level: OptzLevel) -> &FlagList {
        match level {
            OptzLevel::Med => &self.optz_med,
            OptzLevel::Fast => &self.optz_fast,
            OptzLevel::Fastest => &self.optz_fastest,
        }
    }

    fn gnu() -> Self {
        LanguageRules {
            debug: flags(&["-g"]),
            warn: flags(&["-Wall"]),
            verbose: flags(&["-v"]),
            bits32: flags(&["-m32"]),
            bits64: flags(&["-m64"]),
            optz_med: flags(&["-O1"]),
            optz_fast: flags(&["-O2"]),
            optz_fastest: flags(&["-O3"]),
            ..LanguageRules::default()
        }
    }

    fn sun(optz: [&str; 3]) -> Self {
        LanguageRules {
            debug: flags(&["-g"]),
            verbose: flags(&["-v"]),
            bits32: flags(&["-xtarget=generic"]),
            bits64: flags(&["-xtarget=generic64"]),
            link32: flags(&["-xtarget=generic"]),
            link64: flags(&["-xtarget=generic64"]),
            optz_med: flags(&[optz[0]]),
            optz_fast: flags(&[optz[1]]),
            optz_fastest: flags(&[optz[2]]),
            ..LanguageRules::default()
        }
    }

    fn msvc(crt: Crt) -> Self {
        LanguageRules {
            debug: flags(&["/Zi", crt.debug_flag()]),
            warn: flags(&["/Wall"]),
            nowarn: flags(&["/W3", "/wd4290"]),
            bits64: flags(&["/MACHINE:X64"]),
            link32: flags(&["/STACK:80000000"]),
            link64: flags(&["/STACK:80000000"]),
            optz_med: flags(&["-O2", crt.flag()]),
            optz_fast: flags(&["-O2", crt.flag()]),
            optz_fastest: flags(&["-Ox", crt.flag()]),
            ..LanguageRules::default()
        }
    }
}

/// Everything a platform/compiler pair contributes to configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainRule {
    pub platform: PlatformFamily,
    /// Per-purpose flag sets for C
    pub c: LanguageRules,
    /// Per-purpose flag sets for C++
    pub cxx: LanguageRules,
    /// Base flags and defines appended to the C environment
    pub c_env: LanguageFlags,
    /// Base flags and defines appended to the C++ environment
    pub cxx_env: LanguageFlags,
    /// Base linker flags
    pub link_flags: FlagList,
    /// System libraries registered as uselib tokens
    pub system_libs: BTreeMap<String, Vec<String>>,
    /// Thread library that must link, if the platform has one
    pub thread_lib: Option<String>,
}

impl ToolchainRule {
    fn new(platform: PlatformFamily) -> Self {
        ToolchainRule {
            platform,
            c: LanguageRules::default(),
            cxx: LanguageRules::default(),
            c_env: LanguageFlags::default(),
            cxx_env: LanguageFlags::default(),
            link_flags: FlagList::new(),
            system_libs: BTreeMap::new(),
            thread_lib: None,
        }
    }

    fn lib(mut self, token: &str, lib: &str) -> Self {
        self.system_libs
            .entry(token.to_string())
            .or_default()
            .push(lib.to_string());
        self
    }

    pub fn lang(&self, lang: crate::core::Language) -> &LanguageRules {
        match lang {
            crate::core::Language::C => &self.c,
            crate::core::Language::Cxx => &self.cxx,
        }
    }
}

fn flags(items: &[&str]) -> FlagList {
    items.iter().copied().collect()
}

fn lang_env(base: &[&str], defines: &[&str], thread: &[&str]) -> LanguageFlags {
    LanguageFlags {
        flags: flags(base),
        defines: flags(defines),
        thread_flags: flags(thread),
        shlib_flags: FlagList::new(),
    }
}

const POSIX_DEFINES: &[&str] = &["_FILE_OFFSET_BITS=64", "_LARGEFILE_SOURCE", "__POSIX"];
const LARGEFILE_DEFINES: &[&str] = &["_FILE_OFFSET_BITS=64", "_LARGEFILE_SOURCE"];

/// Select the toolchain rules for a platform and compiler.
///
/// Dispatch is a closed match over the platform family; an unclassified
/// platform is a fatal configuration error.
pub fn rules_for(
    platform: &Platform,
    compiler: &Compiler,
    opts: &MatrixOptions,
) -> Result<ToolchainRule, ToolchainError> {
    let rule = match platform.family() {
        PlatformFamily::Apple => apple_rules(),
        PlatformFamily::Linux => linux_rules(compiler.family),
        PlatformFamily::Solaris => solaris_rules(compiler.family),
        PlatformFamily::Windows => windows_rules(opts.crt),
        PlatformFamily::Unknown => {
            return Err(ToolchainError::UnsupportedPlatform(platform.id().to_string()))
        }
    };

    tracing::debug!(
        "toolchain rules: platform={} compiler={}",
        rule.platform,
        compiler.family
    );
    Ok(rule)
}

fn apple_rules() -> ToolchainRule {
    let mut rule = ToolchainRule::new(PlatformFamily::Apple)
        .lib("DL", "dl")
        .lib("NSL", "nsl")
        .lib("THREAD", "pthread");
    rule.thread_lib = Some("pthread".to_string());

    rule.cxx = LanguageRules::gnu();
    rule.c = LanguageRules::gnu();

    rule.cxx_env = lang_env(&["-fPIC"], POSIX_DEFINES, &["-D_REENTRANT"]);
    rule.c_env = lang_env(&["-fPIC", "-dynamiclib"], POSIX_DEFINES, &["-D_REENTRANT"]);
    rule.link_flags = flags(&["-fPIC", "-dynamiclib"]);
    rule
}

fn linux_rules(family: CompilerFamily) -> ToolchainRule {
    let mut rule = ToolchainRule::new(PlatformFamily::Linux)
        .lib("DL", "dl")
        .lib("NSL", "nsl")
        .lib("THREAD", "pthread")
        .lib("MATH", "m");
    rule.thread_lib = Some("pthread".to_string());

    if family == CompilerFamily::SunStudio {
        return with_sun_flags(rule);
    }

    rule.cxx = LanguageRules::gnu();
    rule.c = LanguageRules::gnu();
    // Thread defines travel as flags so they follow the THREAD token.
    rule.cxx_env = lang_env(&["-fPIC"], POSIX_DEFINES, &["-D_REENTRANT"]);
    rule.c_env = lang_env(&["-fPIC"], POSIX_DEFINES, &["-D_REENTRANT"]);
    rule.link_flags = flags(&["-Wl,-E", "-fPIC"]);
    rule
}

fn solaris_rules(family: CompilerFamily) -> ToolchainRule {
    let mut rule = ToolchainRule::new(PlatformFamily::Solaris)
        .lib("DL", "dl")
        .lib("NSL", "nsl")
        .lib("SOCKET", "socket")
        .lib("THREAD", "thread")
        .lib("MATH", "m")
        .lib("CRUN", "Crun")
        .lib("CSTD", "Cstd");
    rule.thread_lib = Some("thread".to_string());

    if family.is_gnu_like() {
        rule.cxx = LanguageRules::gnu();
        rule.c = LanguageRules::gnu();
        rule.cxx_env = lang_env(&["-fPIC"], LARGEFILE_DEFINES, &["-D_REENTRANT"]);
        rule.c_env = lang_env(&["-fPIC"], LARGEFILE_DEFINES, &["-D_REENTRANT"]);
        return rule;
    }

    with_sun_flags(rule)
}

fn with_sun_flags(mut rule: ToolchainRule) -> ToolchainRule {
    rule.cxx = LanguageRules::sun(["-xO3", "-xO4", "-fast"]);
    rule.c = LanguageRules::sun(["-xO2", "-xO3", "-fast"]);

    rule.cxx_env = lang_env(&["-KPIC", "-instances=global"], LARGEFILE_DEFINES, &["-mt"]);
    rule.cxx_env.shlib_flags = flags(&["-KPIC", "-DPIC"]);
    rule.c_env = lang_env(&["-KPIC"], LARGEFILE_DEFINES, &["-mt"]);
    rule.c_env.shlib_flags = flags(&["-KPIC", "-DPIC"]);
    rule
}

fn windows_rules(crt: Crt) -> ToolchainRule {
    let mut rule = ToolchainRule::new(PlatformFamily::Windows)
        .lib("RPC", "rpcrt4")
        .lib("SOCKET", "Ws2_32");

    rule.cxx = LanguageRules::msvc(crt);
    rule.c = LanguageRules::msvc(crt);

    let defines = &[
        "_CRT_SECURE_NO_WARNINGS",
        "_FILE_OFFSET_BITS=64",
        "_LARGEFILE_SOURCE",
        "WIN32",
        "_USE_MATH_DEFINES",
    ];
    let base = &["/UUNICODE", "/U_UNICODE", "/EHs", "/GR"];
    rule.cxx_env = lang_env(base, defines, &["/D_REENTRANT"]);
    rule.c_env = lang_env(base, defines, &["/D_REENTRANT"]);
    rule
}
