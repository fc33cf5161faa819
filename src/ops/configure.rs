//! Implementation of `modbuild configure`.
//!
//! Configuration runs once per build directory:
//! platform → compiler → feature probes → user overrides → toolchain
//! rules → mandatory thread check → variant freeze. The result is written
//! to `<build_dir>/modbuild-config.json` for later commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::probe::{
    check_library, CompilerProbeRunner, FeatureMap, ProbeRunner, ToolchainContext,
};
use crate::builder::toolchain::{Crt, MatrixOptions, OptzLevel, ToolchainRule};
use crate::builder::{
    detect_compiler, freeze_variant, rules_for, Compiler, GraphOptions, ToolchainError, Variant,
    VariantOptions,
};
use crate::core::{Environment, LanguageFlags, Platform, TargetKind};
use crate::util::config::Config;
use crate::util::fs::write_string;

/// File the frozen configuration is written to, inside the build directory.
pub const CONFIGURATION_FILE: &str = "modbuild-config.json";

/// File the probe cache is written to, inside the build directory.
pub const PROBE_CACHE_FILE: &str = "modbuild-probes.json";

/// Default install prefix.
pub const DEFAULT_PREFIX: &str = "/usr/local";

/// Options for configure.
#[derive(Debug, Clone)]
pub struct ConfigureOptions {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub prefix: PathBuf,
    /// Platform id override
    pub platform: Option<String>,
    pub variant: VariantOptions,
    pub crt: Crt,
    pub cflags: Option<String>,
    pub cxxflags: Option<String>,
    pub linkflags: Option<String>,
    /// Comma-separated define tokens added to both compiler families
    pub defs: Option<String>,
    pub shared: bool,
    pub libs_only: bool,
    pub symlinks: bool,
    pub unittests: bool,
    pub doxygen: bool,
}

impl ConfigureOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        ConfigureOptions {
            build_dir: root.join("build"),
            root,
            prefix: PathBuf::from(DEFAULT_PREFIX),
            platform: None,
            variant: VariantOptions::default(),
            crt: Crt::default(),
            cflags: None,
            cxxflags: None,
            linkflags: None,
            defs: None,
            shared: false,
            libs_only: false,
            symlinks: true,
            unittests: false,
            doxygen: false,
        }
    }

    /// Options seeded from user configuration files. Relative directories
    /// are taken relative to `root`.
    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        let mut opts = Self::new(root);
        let build = &config.build;

        let flag = |value: Option<bool>, default: bool| value.unwrap_or(default);
        opts.variant.warnings = flag(build.warnings, opts.variant.warnings);
        opts.variant.debug = flag(build.debug, opts.variant.debug);
        opts.variant.verbose = flag(build.verbose, opts.variant.verbose);
        opts.variant.enable64 = flag(build.enable64, opts.variant.enable64);
        opts.variant.enable32 = flag(build.enable32, opts.variant.enable32);
        opts.shared = flag(build.shared, opts.shared);
        opts.symlinks = flag(build.symlinks, opts.symlinks);
        opts.unittests = flag(build.unittests, opts.unittests);
        opts.libs_only = flag(build.libs_only, opts.libs_only);
        opts.doxygen = flag(build.doxygen, opts.doxygen);

        if let Some(optz) = &build.optz {
            opts.variant.optz = optz
                .parse::<OptzLevel>()
                .map_err(anyhow::Error::msg)
                .context("invalid `build.optz` in config")?;
        }
        if let Some(crt) = &build.crt {
            opts.crt = crt
                .parse::<Crt>()
                .map_err(anyhow::Error::msg)
                .context("invalid `build.crt` in config")?;
        }
        if let Some(dir) = &build.build_dir {
            opts.build_dir = opts.root.join(dir);
        }
        if let Some(prefix) = &build.prefix {
            opts.prefix = prefix.clone();
        }
        opts.platform = build.platform.clone();

        opts.cflags = config.flags.cflags.clone();
        opts.cxxflags = config.flags.cxxflags.clone();
        opts.linkflags = config.flags.linkflags.clone();
        opts.defs = config.flags.defs.clone();
        Ok(opts)
    }
}

/// Everything later commands need from configure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub prefix: PathBuf,
    pub platform: String,
    pub compiler: Compiler,
    pub features: FeatureMap,
    /// Environment shared by every variant
    pub base: Environment,
    pub variant: Variant,
    pub libs_only: bool,
    pub symlinks: bool,
    pub unittests: bool,
}

impl Configuration {
    pub fn platform(&self) -> Platform {
        Platform::new(self.platform.clone())
    }

    /// Graph options matching this configuration.
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            root: self.root.clone(),
            build_dir: self.build_dir.clone(),
            libs_only: self.libs_only,
            symlinks: self.symlinks,
            unittests: self.unittests,
        }
    }

    pub fn file_in(build_dir: &Path) -> PathBuf {
        build_dir.join(CONFIGURATION_FILE)
    }

    /// Write the configuration to `<build_dir>/modbuild-config.json`.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::file_in(&self.build_dir);
        let json =
            serde_json::to_string_pretty(self).context("failed to serialize configuration")?;
        write_string(&path, &json)?;
        Ok(path)
    }

    pub fn load(build_dir: &Path) -> Result<Self> {
        let path = Self::file_in(build_dir);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse configuration {}", path.display()))
    }
}

/// Configure a project with the host compiler and save the result.
pub fn configure(opts: &ConfigureOptions) -> Result<Configuration> {
    let mut ctx = ToolchainContext::new();
    let platform = ctx.platform(opts.platform.as_deref(), &opts.root);
    tracing::info!("platform: {}", platform.id());

    let compiler = detect_compiler(&platform)?;
    tracing::info!(
        "compiler: {} / {} ({})",
        compiler.cc.display(),
        compiler.cxx.display(),
        compiler.family
    );

    let cache_path = opts.build_dir.join(PROBE_CACHE_FILE);
    if let Some(cached) = ToolchainContext::load_matching(&cache_path, platform.id(), &compiler) {
        tracing::debug!("reusing probe results from {}", cache_path.display());
        ctx = cached;
    }
    ctx.set_compiler(&platform, compiler.clone());

    let runner = CompilerProbeRunner::new(compiler.clone(), &platform);
    let config = configure_with(opts, &platform, compiler, &runner, &mut ctx)?;

    ctx.save(&cache_path)?;
    let path = config.save()?;
    tracing::info!("wrote {}", path.display());
    Ok(config)
}

/// Configure against an already detected platform and compiler, probing
/// through `runner`.
pub fn configure_with(
    opts: &ConfigureOptions,
    platform: &Platform,
    compiler: Compiler,
    runner: &dyn ProbeRunner,
    ctx: &mut ToolchainContext,
) -> Result<Configuration> {
    let features = ctx.features(runner).clone();

    let mut base = Environment::new(platform.id());
    base.defines = features.defines.clone();
    for (token, libs) in &features.libs {
        base.add_libs(token, libs.iter().cloned());
    }

    if opts.doxygen {
        base.doxygen = which::which("doxygen").ok();
        tracing::info!(
            "checking for program doxygen : {}",
            base.doxygen
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not found".to_string())
        );
    }

    base.lib_type = if opts.shared {
        TargetKind::SharedLib
    } else {
        TargetKind::StaticLib
    };
    apply_user_flags(&mut base, opts);

    let rule = rules_for(platform, &compiler, &MatrixOptions { crt: opts.crt })?;
    apply_rule(&mut base, &rule);

    if let Some(lib) = &rule.thread_lib {
        if !check_library(runner, lib) {
            return Err(ToolchainError::MandatoryProbeFailed {
                lib: lib.clone(),
                platform: platform.id().to_string(),
            }
            .into());
        }
    }

    let variant = freeze_variant(&mut base, &rule, &opts.variant, platform, runner);

    Ok(Configuration {
        root: opts.root.clone(),
        build_dir: opts.build_dir.clone(),
        prefix: opts.prefix.clone(),
        platform: platform.id().to_string(),
        compiler,
        features,
        base,
        variant,
        libs_only: opts.libs_only,
        symlinks: opts.symlinks,
        unittests: opts.unittests,
    })
}

fn apply_user_flags(env: &mut Environment, opts: &ConfigureOptions) {
    if let Some(flags) = &opts.cxxflags {
        env.cxx.flags.append_unique(flags.split_whitespace());
    }
    if let Some(flags) = &opts.cflags {
        env.c.flags.append_unique(flags.split_whitespace());
    }
    if let Some(flags) = &opts.linkflags {
        env.link_flags.append_unique(flags.split_whitespace());
    }
    if let Some(defs) = &opts.defs {
        let defs: Vec<&str> = defs.split(',').map(str::trim).collect();
        env.c.defines.append_unique(defs.iter().copied());
        env.cxx.defines.append_unique(defs.iter().copied());
    }
}

fn apply_rule(env: &mut Environment, rule: &ToolchainRule) {
    fn merge(dst: &mut LanguageFlags, src: &LanguageFlags) {
        dst.flags.extend_from(&src.flags);
        dst.defines.extend_from(&src.defines);
        dst.thread_flags.extend_from(&src.thread_flags);
        dst.shlib_flags.extend_from(&src.shlib_flags);
    }

    merge(&mut env.cxx, &rule.cxx_env);
    merge(&mut env.c, &rule.c_env);
    env.link_flags.extend_from(&rule.link_flags);
    for (token, libs) in &rule.system_libs {
        env.add_libs(token, libs.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CompilerFamily;
    use crate::test_support::MockProbeRunner;
    use tempfile::TempDir;

    fn gcc() -> Compiler {
        Compiler::new("gcc", "g++", CompilerFamily::Gcc)
    }

    fn linux() -> Platform {
        Platform::new("x86_64-unknown-linux-gnu")
    }

    #[test]
    fn test_configure_linux_debug() {
        let tmp = TempDir::new().unwrap();
        let mut opts = ConfigureOptions::new(tmp.path());
        opts.variant.debug = true;
        opts.cxxflags = Some("-fno-rtti -pipe".to_string());
        opts.defs = Some("USE_LOGGING,LEVEL=2".to_string());

        let runner = MockProbeRunner::new()
            .fail_libs(["sqrt"])
            .run_output("int_size=4\nbig_endian=False\n");
        let mut ctx = ToolchainContext::new();
        let config = configure_with(&opts, &linux(), gcc(), &runner, &mut ctx).unwrap();

        assert_eq!(config.variant.name, "x86_64-unknown-linux-gnu-debug-64");
        let env = &config.variant.env;
        assert!(env.cxx.flags.contains("-fno-rtti"));
        assert!(env.cxx.flags.contains("-fPIC"));
        assert!(env.cxx.flags.contains("-g"));
        assert!(env.cxx.defines.contains("LEVEL=2"));
        assert!(env.c.defines.contains("USE_LOGGING"));
        assert!(env.cxx.defines.contains("__POSIX"));
        assert_eq!(env.libs["THREAD"], vec!["pthread"]);
        assert_eq!(env.libs["MATH"], vec!["m"]);
        assert!(!env.libs.contains_key("SQRT"));
        assert!(env.defines.is_defined("HAVE_UNISTD_H"));
        assert_eq!(env.defines.get("INT_SIZE").map(|v| v.to_string()), Some("4".into()));
        assert_eq!(env.lib_type, TargetKind::StaticLib);
        assert!(ctx.is_probed());
    }

    #[test]
    fn test_shared_libs() {
        let tmp = TempDir::new().unwrap();
        let mut opts = ConfigureOptions::new(tmp.path());
        opts.shared = true;

        let mut ctx = ToolchainContext::new();
        let config =
            configure_with(&opts, &linux(), gcc(), &MockProbeRunner::new(), &mut ctx).unwrap();
        assert_eq!(config.base.lib_type, TargetKind::SharedLib);
        assert_eq!(config.variant.env.lib_type, TargetKind::SharedLib);
    }

    #[test]
    fn test_missing_thread_library_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let opts = ConfigureOptions::new(tmp.path());
        let runner = MockProbeRunner::new().fail_libs(["pthread"]);

        let mut ctx = ToolchainContext::new();
        let err = configure_with(&opts, &linux(), gcc(), &runner, &mut ctx).unwrap_err();
        let err = err.downcast::<ToolchainError>().unwrap();
        assert!(matches!(err, ToolchainError::MandatoryProbeFailed { ref lib, .. } if lib == "pthread"));
    }

    #[test]
    fn test_unsupported_platform_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let opts = ConfigureOptions::new(tmp.path());
        let mut ctx = ToolchainContext::new();
        let err = configure_with(
            &opts,
            &Platform::new("vax-dec-ultrix"),
            gcc(),
            &MockProbeRunner::new(),
            &mut ctx,
        )
        .unwrap_err();
        assert!(err.to_string().contains("OS/platform currently unsupported"));
    }

    #[test]
    fn test_probes_run_once_per_context() {
        let tmp = TempDir::new().unwrap();
        let mut opts = ConfigureOptions::new(tmp.path());
        opts.variant.enable32 = true;
        let mut ctx = ToolchainContext::new();

        let first = MockProbeRunner::new();
        configure_with(&opts, &linux(), gcc(), &first, &mut ctx).unwrap();
        let second = MockProbeRunner::new();
        configure_with(&opts, &linux(), gcc(), &second, &mut ctx).unwrap();

        assert!(first.calls() > 1);
        // Only the mandatory thread check runs again.
        assert_eq!(second.calls(), 1);
    }

    #[test]
    fn test_from_config_and_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.build.debug = Some(true);
        config.build.verbose = Some(true);
        config.build.optz = Some("med".to_string());
        config.build.build_dir = Some(PathBuf::from("out"));
        config.build.symlinks = Some(false);
        config.flags.linkflags = Some("-Wl,--as-needed".to_string());

        let opts = ConfigureOptions::from_config(tmp.path(), &config).unwrap();
        assert!(opts.variant.debug);
        assert!(opts.variant.verbose);
        assert_eq!(opts.variant.optz, OptzLevel::Med);
        assert_eq!(opts.build_dir, tmp.path().join("out"));
        assert!(!opts.symlinks);

        let mut ctx = ToolchainContext::new();
        let configured =
            configure_with(&opts, &linux(), gcc(), &MockProbeRunner::new(), &mut ctx).unwrap();
        assert!(configured.variant.env.link_flags.contains("-Wl,--as-needed"));
        assert!(configured.variant.env.cxx.flags.contains("-v"));

        let path = configured.save().unwrap();
        assert_eq!(path, tmp.path().join("out").join(CONFIGURATION_FILE));
        let loaded = Configuration::load(&tmp.path().join("out")).unwrap();
        assert_eq!(loaded.variant, configured.variant);
        assert!(!loaded.graph_options().symlinks);
    }

    #[test]
    fn test_invalid_optz_in_config() {
        let mut config = Config::default();
        config.build.optz = Some("ludicrous".to_string());
        let err = ConfigureOptions::from_config("/tmp", &config).unwrap_err();
        assert!(format!("{:#}", err).contains("build.optz"));
    }
}
