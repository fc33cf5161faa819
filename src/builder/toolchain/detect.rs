//! Compiler detection functions.

use std::path::{Path, PathBuf};

use which::which;

use super::{Compiler, CompilerFamily, ToolchainError};
use crate::core::{Platform, PlatformFamily};
use crate::util::process::Subprocess;

/// Detect the C/C++ compiler pair for a platform.
///
/// Tries the following, in order:
/// 1. The CC / CXX environment variables
/// 2. On Windows: `cl` for both languages
/// 3. On Solaris: `suncc` / `sunCC`
/// 4. Otherwise: `cc`, `gcc`, `clang` and their C++ counterparts
///
/// Failing to find any C compiler is fatal.
pub fn detect_compiler(platform: &Platform) -> Result<Compiler, ToolchainError> {
    let cc = std::env::var("CC")
        .ok()
        .filter(|cc| !cc.is_empty())
        .and_then(|cc| resolve_program(&cc))
        .or_else(|| search(default_c_compilers(platform)))
        .ok_or(ToolchainError::NoCompiler)?;

    let family = detect_compiler_family(&cc);

    // MSVC compiles both languages with the same driver.
    let cxx = if family == CompilerFamily::Msvc {
        cc.clone()
    } else {
        std::env::var("CXX")
            .ok()
            .filter(|cxx| !cxx.is_empty())
            .and_then(|cxx| resolve_program(&cxx))
            .or_else(|| search(default_cxx_compilers(family)))
            .unwrap_or_else(|| infer_cxx(&cc))
    };

    tracing::info!(
        "Using compiler: cc={}, cxx={} ({})",
        cc.display(),
        cxx.display(),
        family
    );

    Ok(Compiler::new(cc, cxx, family))
}

fn default_c_compilers(platform: &Platform) -> &'static [&'static str] {
    match platform.family() {
        PlatformFamily::Windows => &["cl", "gcc", "clang"],
        PlatformFamily::Solaris => &["suncc", "cc", "gcc"],
        _ => &["cc", "gcc", "clang"],
    }
}

fn default_cxx_compilers(family: CompilerFamily) -> &'static [&'static str] {
    match family {
        CompilerFamily::SunStudio => &["sunCC", "CC"],
        CompilerFamily::Clang | CompilerFamily::AppleClang => &["clang++", "c++"],
        _ => &["c++", "g++", "clang++"],
    }
}

fn resolve_program(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_absolute() && path.exists() {
        return Some(path);
    }
    which(name).ok()
}

fn search(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| which(name).ok())
}

/// Infer a C++ compiler path from a C compiler path.
///
/// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
/// - clang -> clang++
/// - cc, /usr/bin/cc -> c++, /usr/bin/c++
fn infer_cxx(cc: &Path) -> PathBuf {
    let cc_str = cc.to_string_lossy();

    if let Some(prefix) = cc_str.strip_suffix("gcc") {
        return PathBuf::from(format!("{}g++", prefix));
    }
    if cc_str.ends_with("clang") {
        return PathBuf::from(format!("{}++", cc_str));
    }
    if cc_str.ends_with("suncc") {
        return PathBuf::from(format!("{}CC", &cc_str[..cc_str.len() - 2]));
    }
    if let Some(prefix) = cc_str.strip_suffix("cc") {
        if prefix.is_empty() || prefix.ends_with('/') || prefix.ends_with('\\') || prefix.ends_with('-') {
            return PathBuf::from(format!("{}c++", prefix));
        }
    }

    PathBuf::from(format!("{}++", cc_str))
}

/// Detect the compiler family from the binary name, falling back to
/// `--version` output. Unrecognised compilers are treated as GCC.
pub fn detect_compiler_family(cc: &Path) -> CompilerFamily {
    let name = cc
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name == "cl" {
        return CompilerFamily::Msvc;
    }
    if name.contains("suncc") {
        return CompilerFamily::SunStudio;
    }
    if name.contains("gcc") || name.contains("g++") {
        return CompilerFamily::Gcc;
    }

    let version = Subprocess::new(cc)
        .arg("--version")
        .run()
        .map(|out| format!("{}{}", out.stdout, out.stderr).to_lowercase())
        .unwrap_or_default();

    family_from_version_text(&name, &version)
}

fn family_from_version_text(name: &str, version: &str) -> CompilerFamily {
    if version.contains("apple") && version.contains("clang") {
        CompilerFamily::AppleClang
    } else if version.contains("clang") || name.contains("clang") {
        CompilerFamily::Clang
    } else if version.contains("sun c") || version.contains("studio") {
        CompilerFamily::SunStudio
    } else {
        CompilerFamily::Gcc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_cxx() {
        assert_eq!(infer_cxx(Path::new("gcc")), PathBuf::from("g++"));
        assert_eq!(
            infer_cxx(Path::new("/usr/bin/x86_64-linux-gnu-gcc")),
            PathBuf::from("/usr/bin/x86_64-linux-gnu-g++")
        );
        assert_eq!(infer_cxx(Path::new("clang")), PathBuf::from("clang++"));
        assert_eq!(infer_cxx(Path::new("/usr/bin/cc")), PathBuf::from("/usr/bin/c++"));
        assert_eq!(infer_cxx(Path::new("suncc")), PathBuf::from("sunCC"));
        assert_eq!(infer_cxx(Path::new("tcc")), PathBuf::from("tcc++"));
    }

    #[test]
    fn test_family_from_name() {
        assert_eq!(detect_compiler_family(Path::new("/usr/bin/gcc")), CompilerFamily::Gcc);
        assert_eq!(detect_compiler_family(Path::new("cl.exe")), CompilerFamily::Msvc);
        assert_eq!(detect_compiler_family(Path::new("suncc")), CompilerFamily::SunStudio);
    }

    #[test]
    fn test_family_from_version_text() {
        assert_eq!(
            family_from_version_text("cc", "apple clang version 15.0.0"),
            CompilerFamily::AppleClang
        );
        assert_eq!(
            family_from_version_text("cc", "ubuntu clang version 18.1.3"),
            CompilerFamily::Clang
        );
        assert_eq!(
            family_from_version_text("cc", "cc (gcc) 13.2.0"),
            CompilerFamily::Gcc
        );
        assert_eq!(
            family_from_version_text("cc", "cc: sun c 5.12 sunos_sparc"),
            CompilerFamily::SunStudio
        );
    }
}
