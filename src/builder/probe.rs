//! Host platform and compiler feature probing.
//!
//! Probes compile (and optionally link and run) tiny programs through a
//! [`ProbeRunner`]. The real runner drives the detected compiler in a scratch
//! directory; tests substitute a scripted runner.
//!
//! Results are memoized in a [`ToolchainContext`], which can be persisted
//! next to the build output and reused as long as its fingerprint matches.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::builder::toolchain::{Compiler, CompilerFamily};
use crate::core::env::{DefineMap, DefineValue};
use crate::core::{Language, Platform};
use crate::util::fs::{find_file_named, make_executable};
use crate::util::hash::Fingerprint;
use crate::util::process::Subprocess;

/// Name of the platform identification script searched for in the tree.
pub const PLATFORM_SCRIPT: &str = "config.guess";

/// Determine the platform id.
///
/// An override is returned verbatim. Otherwise a `config.guess` script under
/// `search_root` is made executable and run; its first output line wins if
/// it ran successfully and printed something. In every other case the
/// process's own OS id is used.
pub fn detect_platform(override_id: Option<&str>, search_root: &Path) -> String {
    if let Some(id) = override_id {
        return id.to_string();
    }

    let default = Platform::builtin_id();
    if default == "win32" {
        return default.to_string();
    }

    let Some(script) = find_file_named(search_root, PLATFORM_SCRIPT) else {
        tracing::debug!("no {} under {}", PLATFORM_SCRIPT, search_root.display());
        return default.to_string();
    };

    match run_platform_script(&script) {
        Some(id) => id,
        None => {
            tracing::debug!("{} produced no platform id", script.display());
            default.to_string()
        }
    }
}

fn run_platform_script(script: &Path) -> Option<String> {
    if let Err(e) = make_executable(script) {
        tracing::warn!("{:#}", e);
        return None;
    }

    let output = Subprocess::new(script).run().ok()?;
    if !output.success() {
        return None;
    }
    output.first_line().map(String::from)
}

/// How far a probe goes with its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Compile,
    Link,
    Run,
}

/// A single compile/link/run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub lang: Language,
    pub source: String,
    pub mode: ProbeMode,
    /// Extra compile flags
    pub flags: Vec<String>,
    /// Extra link flags
    pub link_flags: Vec<String>,
    /// Libraries to link against
    pub libs: Vec<String>,
    /// Define tokens passed to the compiler
    pub defines: Vec<String>,
}

impl ProbeRequest {
    pub fn new(lang: Language, source: impl Into<String>, mode: ProbeMode) -> Self {
        ProbeRequest {
            lang,
            source: source.into(),
            mode,
            flags: Vec::new(),
            link_flags: Vec::new(),
            libs: Vec::new(),
            defines: Vec::new(),
        }
    }
}

/// What a probe run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Standard output of the program, for `ProbeMode::Run`
    pub stdout: String,
}

impl ProbeOutcome {
    pub fn failed() -> Self {
        ProbeOutcome::default()
    }
}

/// Something that can compile, link and run probe programs.
pub trait ProbeRunner {
    fn run(&self, request: &ProbeRequest) -> ProbeOutcome;
}

/// Probe runner backed by a real compiler.
pub struct CompilerProbeRunner {
    compiler: Compiler,
    exe_suffix: &'static str,
}

impl CompilerProbeRunner {
    pub fn new(compiler: Compiler, platform: &Platform) -> Self {
        CompilerProbeRunner {
            compiler,
            exe_suffix: platform.exe_suffix(),
        }
    }

    fn try_run(&self, request: &ProbeRequest) -> Result<ProbeOutcome> {
        let scratch = TempDir::new().context("failed to create probe directory")?;
        let source = scratch
            .path()
            .join(format!("probe.{}", request.lang.test_extension()));
        fs::write(&source, &request.source)
            .with_context(|| format!("failed to write {}", source.display()))?;

        let exe = scratch.path().join(format!("probe{}", self.exe_suffix));
        let cmd = self.command(request, &source, &exe).cwd(scratch.path());
        let output = cmd.run()?;
        if !output.success() {
            tracing::debug!("probe failed: {}", output.stderr.trim());
            return Ok(ProbeOutcome::failed());
        }

        if request.mode != ProbeMode::Run {
            return Ok(ProbeOutcome {
                success: true,
                stdout: String::new(),
            });
        }

        let output = Subprocess::new(&exe).cwd(scratch.path()).run()?;
        Ok(ProbeOutcome {
            success: output.success(),
            stdout: output.stdout,
        })
    }

    fn command(&self, request: &ProbeRequest, source: &Path, exe: &Path) -> Subprocess {
        let driver = self.compiler.path_for(request.lang);
        let mut cmd = Subprocess::new(driver).args(&request.flags);

        if self.compiler.family == CompilerFamily::Msvc {
            cmd = cmd
                .arg("/nologo")
                .args(request.defines.iter().map(|d| format!("/D{}", d)));
            if request.mode == ProbeMode::Compile {
                return cmd.arg("/c").arg(source);
            }
            return cmd
                .arg(source)
                .arg(format!("/Fe{}", exe.display()))
                .arg("/link")
                .args(&request.link_flags)
                .args(request.libs.iter().map(|l| format!("{}.lib", l)));
        }

        cmd = cmd.args(request.defines.iter().map(|d| format!("-D{}", d)));
        if request.mode == ProbeMode::Compile {
            return cmd.arg("-c").arg(source).arg("-o").arg(exe.with_extension("o"));
        }
        cmd.arg(source)
            .arg("-o")
            .arg(exe)
            .args(&request.link_flags)
            .args(request.libs.iter().map(|l| format!("-l{}", l)))
    }
}

impl ProbeRunner for CompilerProbeRunner {
    fn run(&self, request: &ProbeRequest) -> ProbeOutcome {
        match self.try_run(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("probe could not run: {:#}", e);
                ProbeOutcome::failed()
            }
        }
    }
}

/// One entry of the fixed feature-probe list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureProbe {
    /// `#include <header>` compiles
    Header(&'static str),
    /// `function` links, optionally against `lib`
    Function {
        function: &'static str,
        header: &'static str,
        lib: Option<&'static str>,
    },
    /// `type_name` is declared by `header`
    Type {
        type_name: &'static str,
        header: &'static str,
    },
    /// An arbitrary program compiles
    Fragment {
        source: &'static str,
        define: &'static str,
        msg: &'static str,
    },
    /// `lib` links; stored under the `store` uselib token
    Library {
        lib: &'static str,
        store: &'static str,
    },
}

const EMPTY_MAIN: &str = "int main(void) { return 0; }\n";

impl FeatureProbe {
    /// Define recorded for this probe.
    pub fn define_name(&self) -> String {
        let subject = match self {
            FeatureProbe::Header(header) => *header,
            FeatureProbe::Function { function, .. } => *function,
            FeatureProbe::Type { type_name, .. } => *type_name,
            FeatureProbe::Fragment { define, .. } => return define.to_string(),
            FeatureProbe::Library { store, .. } => *store,
        };
        define_for(subject)
    }

    fn describe(&self) -> String {
        match self {
            FeatureProbe::Header(header) => format!("header {}", header),
            FeatureProbe::Function { function, .. } => format!("function {}", function),
            FeatureProbe::Type { type_name, .. } => format!("type {}", type_name),
            FeatureProbe::Fragment { msg, .. } => msg.to_string(),
            FeatureProbe::Library { lib, .. } => format!("library {}", lib),
        }
    }

    fn request(&self, defines: &[String]) -> ProbeRequest {
        let mut request = match self {
            FeatureProbe::Header(header) => ProbeRequest::new(
                Language::C,
                format!("#include <{}>\n{}", header, EMPTY_MAIN),
                ProbeMode::Compile,
            ),
            FeatureProbe::Function {
                function,
                header,
                lib,
            } => {
                let mut req = ProbeRequest::new(
                    Language::C,
                    format!(
                        "#include <{}>\nint main(void) {{ void *p = (void *)(&{}); (void)p; return 0; }}\n",
                        header, function
                    ),
                    ProbeMode::Link,
                );
                req.libs.extend(lib.map(String::from));
                req
            }
            FeatureProbe::Type { type_name, header } => ProbeRequest::new(
                Language::C,
                format!(
                    "#include <{}>\nint main(void) {{ if ((({} *) 0)) return 0; if (sizeof ({})) return 0; return 0; }}\n",
                    header, type_name, type_name
                ),
                ProbeMode::Compile,
            ),
            FeatureProbe::Fragment { source, .. } => {
                ProbeRequest::new(Language::C, *source, ProbeMode::Compile)
            }
            FeatureProbe::Library { lib, .. } => {
                let mut req = ProbeRequest::new(Language::C, EMPTY_MAIN, ProbeMode::Link);
                req.libs.push(lib.to_string());
                req
            }
        };
        request.defines = defines.to_vec();
        request
    }
}

/// `HAVE_` define for a header, function, type or library subject:
/// `sys/time.h` becomes `HAVE_SYS_TIME_H`.
pub fn define_for(subject: &str) -> String {
    let mangled: String = subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("HAVE_{}", mangled)
}

/// The probes run on every configure, in order.
pub fn standard_probes() -> Vec<FeatureProbe> {
    use FeatureProbe::*;

    let mut probes: Vec<FeatureProbe> = [
        "inttypes.h",
        "unistd.h",
        "getopt.h",
        "malloc.h",
        "sys/time.h",
        "dlfcn.h",
        "fcntl.h",
        "check.h",
        "memory.h",
        "string.h",
        "strings.h",
        "stdbool.h",
        "stdlib.h",
        "stddef.h",
    ]
    .into_iter()
    .map(Header)
    .collect();

    fn function(function: &'static str, header: &'static str) -> FeatureProbe {
        FeatureProbe::Function {
            function,
            header,
            lib: None,
        }
    }

    probes.extend([
        function("mmap", "sys/mman.h"),
        function("memmove", "string.h"),
        function("strerror", "string.h"),
        function("bcopy", "strings.h"),
        Type {
            type_name: "size_t",
            header: "stddef.h",
        },
        Fragment {
            source: "int main(){const int i = 0; return 0;}",
            define: "HAVE_CONST",
            msg: "const keyword",
        },
        Fragment {
            source: "int main(){unsigned short; return 0;}",
            define: "HAVE_UNSIGNED_SHORT",
            msg: "unsigned short",
        },
        Fragment {
            source: "int main(){unsigned char i; return 0;}",
            define: "HAVE_UNSIGNED_CHAR",
            msg: "unsigned char",
        },
        Library {
            lib: "m",
            store: "MATH",
        },
        Library {
            lib: "rt",
            store: "RT",
        },
        Library {
            lib: "sqrt",
            store: "SQRT",
        },
        function("gettimeofday", "sys/time.h"),
        CLOCK_GETTIME,
        function("BSDgettimeofday", "sys/time.h"),
        function("gethrtime", "sys/time.h"),
        function("getpagesize", "unistd.h"),
        function("getopt", "unistd.h"),
        function("getopt_long", "getopt.h"),
        Fragment {
            source: "#include <math.h>\nint main(){if (!isnan(3.14159)) isnan(2.7183);}",
            define: "HAVE_ISNAN",
            msg: "function isnan",
        },
        // AIX has gethrtime but no hrtime_t.
        Fragment {
            source: "#ifdef HAVE_SYS_TIME_H\n#include <sys/time.h>\nint main(){hrtime_t foobar;}\n#endif\n",
            define: "HAVE_HRTIME_T",
            msg: "type hrtime_t",
        },
    ]);

    probes
}

const CLOCK_GETTIME: FeatureProbe = FeatureProbe::Function {
    function: "clock_gettime",
    header: "time.h",
    lib: Some("rt"),
};

/// Program that reports byte order and primitive type sizes as `key=value`.
pub const TYPE_SIZES_SOURCE: &str = r#"#include <stdio.h>
int isBigEndian()
{
    long one = 1;
    return !(*((char *)(&one)));
}
int main()
{
    if (isBigEndian()) printf("bigendian=True\n");
    else printf("bigendian=False\n");
    printf("sizeof_int=%d\n", (int)sizeof(int));
    printf("sizeof_short=%d\n", (int)sizeof(short));
    printf("sizeof_long=%d\n", (int)sizeof(long));
    printf("sizeof_long_long=%d\n", (int)sizeof(long long));
    printf("sizeof_float=%d\n", (int)sizeof(float));
    printf("sizeof_double=%d\n", (int)sizeof(double));
    return 0;
}
"#;

/// Parse `key=value` lines into typed values, keys upper-cased.
///
/// Lines without `=` are ignored.
pub fn parse_type_sizes(output: &str) -> Vec<(String, DefineValue)> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_uppercase(), DefineValue::parse(value)))
        .collect()
}

/// Outcome of the full feature-probe pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureMap {
    /// Define per probe; failed probes are recorded as absent
    pub defines: DefineMap,
    /// Libraries found by library probes, by uselib token
    pub libs: BTreeMap<String, Vec<String>>,
}

impl FeatureMap {
    pub fn has(&self, define: &str) -> bool {
        self.defines.is_defined(define)
    }
}

/// Run every standard probe plus the type-size program.
///
/// Non-mandatory probes never fail configuration: a failing probe is
/// recorded as absent and emits no define.
pub fn run_feature_probes(runner: &dyn ProbeRunner) -> FeatureMap {
    let mut features = FeatureMap::default();

    for probe in standard_probes() {
        let request = probe.request(&features.defines.to_tokens());
        let found = runner.run(&request).success;
        tracing::info!(
            "checking for {} : {}",
            probe.describe(),
            if found { "yes" } else { "no" }
        );

        let define = probe.define_name();
        if !found {
            features.defines.undefine(define);
            continue;
        }
        features.defines.define(define, 1);

        if let FeatureProbe::Library { lib, store } = &probe {
            features.libs.entry(store.to_string()).or_default().push(lib.to_string());
        }
        if probe == CLOCK_GETTIME {
            features.defines.define("USE_CLOCK_GETTIME", 1);
        }
    }

    let sizes = runner.run(&ProbeRequest::new(
        Language::C,
        TYPE_SIZES_SOURCE,
        ProbeMode::Run,
    ));
    if sizes.success {
        for (key, value) in parse_type_sizes(&sizes.stdout) {
            tracing::info!("{} : {}", key.to_lowercase().replace('_', " "), value);
            features.defines.define(key, value);
        }
    } else {
        tracing::warn!("could not determine system type sizes");
    }

    features
}

/// Whether a library links with the given compiler. Used for mandatory
/// checks such as the platform thread library.
pub fn check_library(runner: &dyn ProbeRunner, lib: &str) -> bool {
    let mut request = ProbeRequest::new(Language::C, EMPTY_MAIN, ProbeMode::Link);
    request.libs.push(lib.to_string());
    let found = runner.run(&request).success;
    tracing::info!(
        "checking for library {} : {}",
        lib,
        if found { "yes" } else { "no" }
    );
    found
}

/// Detection results computed once and reused.
///
/// Construct one per configure run and pass it by reference. Each probe
/// group runs at most once per context; a context loaded from disk skips
/// probing entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainContext {
    fingerprint: String,
    platform: Option<String>,
    compiler: Option<Compiler>,
    features: Option<FeatureMap>,
}

impl ToolchainContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint identifying the inputs detection depends on.
    pub fn fingerprint_for(platform: &str, compiler: &Compiler) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(platform)
            .update_str(&compiler.cc.to_string_lossy())
            .update_str(&compiler.cxx.to_string_lossy())
            .update_str(compiler.family.as_str());
        fp.finish()
    }

    /// Platform id, detected on first use.
    pub fn platform(&mut self, override_id: Option<&str>, search_root: &Path) -> Platform {
        let id = self
            .platform
            .get_or_insert_with(|| detect_platform(override_id, search_root));
        Platform::new(id.clone())
    }

    /// Record the compiler in use. Features probed for a different compiler
    /// are discarded.
    pub fn set_compiler(&mut self, platform: &Platform, compiler: Compiler) {
        let fingerprint = Self::fingerprint_for(platform.id(), &compiler);
        if self.fingerprint != fingerprint {
            self.features = None;
            self.fingerprint = fingerprint;
        }
        self.compiler = Some(compiler);
    }

    pub fn compiler(&self) -> Option<&Compiler> {
        self.compiler.as_ref()
    }

    /// Feature probe results, probing on first use.
    pub fn features(&mut self, runner: &dyn ProbeRunner) -> &FeatureMap {
        self.features
            .get_or_insert_with(|| run_feature_probes(runner))
    }

    pub fn is_probed(&self) -> bool {
        self.features.is_some()
    }

    /// Persist the context as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize probe cache")?;
        crate::util::fs::write_string(path, &json)
    }

    /// Load a saved context if it was produced for the same platform and
    /// compiler. A missing, unreadable or stale file yields `None`.
    pub fn load_matching(path: &Path, platform: &str, compiler: &Compiler) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        let ctx: ToolchainContext = match serde_json::from_str(&contents) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!("ignoring probe cache {}: {}", path.display(), e);
                return None;
            }
        };

        if ctx.fingerprint != Self::fingerprint_for(platform, compiler) {
            tracing::debug!("probe cache {} is stale", path.display());
            return None;
        }
        Some(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockProbeRunner;

    #[test]
    fn test_override_is_verbatim() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(detect_platform(Some("win32"), tmp.path()), "win32");
    }

    #[test]
    fn test_fallback_without_script() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(detect_platform(None, tmp.path()), Platform::builtin_id());
    }

    #[cfg(unix)]
    #[test]
    fn test_script_output_wins() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("build");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(PLATFORM_SCRIPT),
            "#!/bin/sh\necho x86_64-unknown-linux-gnu\necho ignored\n",
        )
        .unwrap();

        assert_eq!(detect_platform(None, tmp.path()), "x86_64-unknown-linux-gnu");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_script_falls_back() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PLATFORM_SCRIPT), "#!/bin/sh\necho nope\nexit 1\n").unwrap();
        assert_eq!(detect_platform(None, tmp.path()), Platform::builtin_id());

        fs::write(tmp.path().join(PLATFORM_SCRIPT), "#!/bin/sh\nexit 0\n").unwrap();
        assert_eq!(detect_platform(None, tmp.path()), Platform::builtin_id());
    }

    #[test]
    fn test_define_for() {
        assert_eq!(define_for("sys/time.h"), "HAVE_SYS_TIME_H");
        assert_eq!(define_for("getopt_long"), "HAVE_GETOPT_LONG");
        assert_eq!(define_for("MATH"), "HAVE_MATH");
    }

    #[test]
    fn test_parse_type_sizes() {
        let parsed = parse_type_sizes("bigendian=False\nsizeof_int=4\nnoise\nname= abc \n");
        assert_eq!(
            parsed,
            vec![
                ("BIGENDIAN".to_string(), DefineValue::Bool(false)),
                ("SIZEOF_INT".to_string(), DefineValue::Int(4)),
                ("NAME".to_string(), DefineValue::Text("abc".into())),
            ]
        );
    }

    #[test]
    fn test_feature_probes_record_absence() {
        let runner = MockProbeRunner::new()
            .fail_libs(["rt", "sqrt"])
            .fail_source("check.h")
            .run_output("bigendian=False\nsizeof_long=8\n");
        let features = run_feature_probes(&runner);

        assert!(features.has("HAVE_STDLIB_H"));
        assert!(!features.has("HAVE_CHECK_H"));
        assert!(features.has("HAVE_MATH"));
        assert!(!features.has("HAVE_RT"));
        assert!(!features.has("USE_CLOCK_GETTIME"));
        assert_eq!(features.libs["MATH"], vec!["m"]);
        assert!(!features.libs.contains_key("RT"));
        assert_eq!(features.defines.get("SIZEOF_LONG"), Some(&DefineValue::Int(8)));

        let tokens = features.defines.to_tokens();
        assert!(tokens.contains(&"HAVE_MMAP".to_string()));
        assert!(tokens.contains(&"BIGENDIAN=0".to_string()));
        assert!(!tokens.iter().any(|t| t.starts_with("HAVE_CHECK_H")));
    }

    #[test]
    fn test_clock_gettime_sets_use_define() {
        let runner = MockProbeRunner::new();
        let features = run_feature_probes(&runner);
        assert!(features.has("HAVE_CLOCK_GETTIME"));
        assert!(features.has("USE_CLOCK_GETTIME"));
    }

    #[test]
    fn test_context_probes_once() {
        let runner = MockProbeRunner::new();
        let mut ctx = ToolchainContext::new();
        ctx.features(&runner);
        let calls = runner.calls();
        ctx.features(&runner);
        assert_eq!(runner.calls(), calls);
        assert!(ctx.is_probed());
    }

    #[test]
    fn test_context_cache_roundtrip_and_staleness() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("probe-cache.json");
        let platform = Platform::new("x86_64-unknown-linux-gnu");
        let gcc = Compiler::new("gcc", "g++", CompilerFamily::Gcc);

        let mut ctx = ToolchainContext::new();
        ctx.set_compiler(&platform, gcc.clone());
        ctx.features(&MockProbeRunner::new());
        ctx.save(&path).unwrap();

        let loaded = ToolchainContext::load_matching(&path, platform.id(), &gcc).unwrap();
        assert!(loaded.is_probed());

        let clang = Compiler::new("clang", "clang++", CompilerFamily::Clang);
        assert!(ToolchainContext::load_matching(&path, platform.id(), &clang).is_none());
    }
}
