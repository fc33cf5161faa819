//! Variant selection.
//!
//! A variant is the base environment plus the debug/release and bit-width
//! choices, frozen under a name of the form `{platform}-{debug|release}[-64]`.

use serde::{Deserialize, Serialize};

use crate::builder::probe::{ProbeMode, ProbeRequest, ProbeRunner};
use crate::builder::toolchain::{OptzLevel, ToolchainRule};
use crate::core::env::{Environment, FlagList};
use crate::core::{Language, Platform};

/// Caller choices that shape a variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantOptions {
    pub debug: bool,
    pub optz: OptzLevel,
    /// Request 64-bit code; honored directly only on Windows
    pub enable64: bool,
    /// Force 32-bit code, skipping the 64-bit capability check
    pub enable32: bool,
    pub warnings: bool,
    pub verbose: bool,
}

/// A frozen, named environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub env: Environment,
}

/// Build the variant environment from `base`.
///
/// Warning and verbosity flags are applied to `base` itself, so they are
/// shared by every variant derived from it. Everything after that goes into
/// a private copy. `base` is tagged with the resulting variant name.
pub fn freeze_variant(
    base: &mut Environment,
    rule: &ToolchainRule,
    opts: &VariantOptions,
    platform: &Platform,
    runner: &dyn ProbeRunner,
) -> Variant {
    for lang in [Language::Cxx, Language::C] {
        let rules = rule.lang(lang);
        let flags = &mut base.lang_mut(lang).flags;
        if opts.warnings {
            flags.extend_from(&rules.warn);
        } else {
            flags.extend_from(&rules.nowarn);
        }
        if opts.verbose {
            flags.extend_from(&rules.verbose);
        }
    }

    let mut env = base.clone();
    let mut name = if opts.debug {
        for lang in [Language::Cxx, Language::C] {
            env.lang_mut(lang).flags.extend_from(&rule.lang(lang).debug);
        }
        format!("{}-debug", platform.id())
    } else {
        for lang in [Language::Cxx, Language::C] {
            env.lang_mut(lang)
                .flags
                .extend_from(rule.lang(lang).optz(opts.optz));
        }
        format!("{}-release", platform.id())
    };

    let is_64bit = if platform.is_windows() {
        opts.enable64
    } else if opts.enable32 {
        false
    } else {
        supports_64bit(rule, runner)
    };

    if is_64bit {
        if !platform.is_windows() {
            name.push_str("-64");
        }
        env.cxx.flags.extend_from(&rule.cxx.bits64);
        env.c.flags.extend_from(&rule.c.bits64);
        env.link_flags.extend_from(&rule.c.link64);
    } else {
        env.cxx.flags.extend_from(&rule.cxx.bits32);
        env.c.flags.extend_from(&rule.c.bits32);
        env.link_flags.extend_from(&rule.c.link32);
    }

    env.variant = Some(name.clone());
    env.is_64bit = is_64bit;
    base.variant = Some(name.clone());

    tracing::info!("variant: {}", name);
    Variant { name, env }
}

/// Compile and link a trivial program with the 64-bit flags of both
/// compiler families. Rules without 64-bit flags are never 64-bit.
fn supports_64bit(rule: &ToolchainRule, runner: &dyn ProbeRunner) -> bool {
    if rule.cxx.bits64.is_empty() {
        return false;
    }

    let check = |lang: Language, flags: &FlagList| {
        let mut request = ProbeRequest::new(lang, "int main() { return 0; }\n", ProbeMode::Link);
        request.flags = flags.as_slice().to_vec();
        request.link_flags = rule.c.link64.as_slice().to_vec();
        runner.run(&request).success
    };

    let ok = check(Language::Cxx, &rule.cxx.bits64) && check(Language::C, &rule.c.bits64);
    tracing::info!("checking for 64-bit support : {}", if ok { "yes" } else { "no" });
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{rules_for, Compiler, CompilerFamily, MatrixOptions};
    use crate::test_support::MockProbeRunner;

    fn linux() -> (Platform, ToolchainRule) {
        let platform = Platform::new("x86_64-unknown-linux-gnu");
        let gcc = Compiler::new("gcc", "g++", CompilerFamily::Gcc);
        let rule = rules_for(&platform, &gcc, &MatrixOptions::default()).unwrap();
        (platform, rule)
    }

    #[test]
    fn test_debug_64_variant_name() {
        let (platform, rule) = linux();
        let mut base = Environment::new(platform.id());
        let opts = VariantOptions {
            debug: true,
            ..VariantOptions::default()
        };
        let variant = freeze_variant(&mut base, &rule, &opts, &platform, &MockProbeRunner::new());

        assert_eq!(variant.name, "x86_64-unknown-linux-gnu-debug-64");
        assert!(variant.env.is_64bit);
        assert!(variant.env.cxx.flags.contains("-g"));
        assert!(variant.env.cxx.flags.contains("-m64"));
        assert!(!base.cxx.flags.contains("-g"));
        assert_eq!(base.variant.as_deref(), Some(variant.name.as_str()));
    }

    #[test]
    fn test_verbose_flag_reaches_both_families() {
        let (platform, rule) = linux();
        let mut base = Environment::new(platform.id());
        let opts = VariantOptions {
            verbose: true,
            ..VariantOptions::default()
        };
        let variant = freeze_variant(&mut base, &rule, &opts, &platform, &MockProbeRunner::new());

        assert!(variant.env.cxx.flags.contains("-v"));
        assert!(variant.env.c.flags.contains("-v"));

        let mut quiet = Environment::new(platform.id());
        let variant = freeze_variant(
            &mut quiet,
            &rule,
            &VariantOptions::default(),
            &platform,
            &MockProbeRunner::new(),
        );
        assert!(!variant.env.cxx.flags.contains("-v"));
    }

    #[test]
    fn test_release_falls_back_to_32bit() {
        let (platform, rule) = linux();
        let mut base = Environment::new(platform.id());
        let runner = MockProbeRunner::new().fail_flag("-m64");
        let variant =
            freeze_variant(&mut base, &rule, &VariantOptions::default(), &platform, &runner);

        assert_eq!(variant.name, "x86_64-unknown-linux-gnu-release");
        assert!(!variant.env.is_64bit);
        assert!(variant.env.c.flags.contains("-O3"));
        assert!(variant.env.c.flags.contains("-m32"));
    }

    #[test]
    fn test_enable32_skips_probe() {
        let (platform, rule) = linux();
        let mut base = Environment::new(platform.id());
        let runner = MockProbeRunner::new();
        let opts = VariantOptions {
            enable32: true,
            optz: OptzLevel::Med,
            warnings: true,
            ..VariantOptions::default()
        };
        let variant = freeze_variant(&mut base, &rule, &opts, &platform, &runner);

        assert_eq!(runner.calls(), 0);
        assert_eq!(variant.name, "x86_64-unknown-linux-gnu-release");
        assert!(base.cxx.flags.contains("-Wall"));
        assert!(variant.env.cxx.flags.contains("-O1"));
    }

    #[test]
    fn test_windows_honors_enable64_without_suffix() {
        let platform = Platform::new("win32");
        let cl = Compiler::new("cl", "cl", CompilerFamily::Msvc);
        let rule = rules_for(&platform, &cl, &MatrixOptions::default()).unwrap();
        let mut base = Environment::new(platform.id());
        let opts = VariantOptions {
            enable64: true,
            ..VariantOptions::default()
        };
        let variant = freeze_variant(&mut base, &rule, &opts, &platform, &MockProbeRunner::failing());

        assert_eq!(variant.name, "win32-release");
        assert!(variant.env.is_64bit);
        assert!(variant.env.cxx.flags.contains("/MACHINE:X64"));
        assert!(variant.env.link_flags.contains("/STACK:80000000"));
        assert!(base.cxx.flags.contains("/W3"));
    }
}
