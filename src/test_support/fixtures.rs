//! Test fixtures: module source trees and fake test binaries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fixture for a module directory laid out the conventional way:
/// `include/`, `source/`, `tests/`, `unittests/`.
#[derive(Debug, Clone)]
pub struct ModuleFixture {
    /// Module name, also the directory name.
    pub name: String,
    /// Files relative to the module directory.
    pub files: BTreeMap<PathBuf, String>,
}

impl ModuleFixture {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleFixture {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    /// A C++ module with one header and one source file.
    pub fn cxx(name: impl Into<String>) -> Self {
        let name = name.into();
        let header = format!("include/{name}/{name}.h");
        let source = format!("source/{name}.cpp");
        ModuleFixture::new(name.clone())
            .with_file(header, format!("int {name}_init();\n"))
            .with_file(source, format!("int {name}_init() {{ return 0; }}\n"))
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Add a program under `tests/`.
    pub fn with_test(self, file: &str) -> Self {
        self.with_file(format!("tests/{file}"), "int main() { return 0; }\n")
    }

    /// Add a unit test under `unittests/`.
    pub fn with_unittest(self, file: &str) -> Self {
        self.with_file(format!("unittests/{file}"), "int main() { return 0; }\n")
    }

    /// Write the module under `base`, returning its directory.
    pub fn write_to(&self, base: &Path) -> std::io::Result<PathBuf> {
        let dir = base.join(&self.name);
        std::fs::create_dir_all(&dir)?;
        for (rel, content) in &self.files {
            let full = dir.join(rel);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, content)?;
        }
        Ok(dir)
    }
}

/// Write an executable shell script that stands in for a test binary.
#[cfg(unix)]
pub fn write_test_binary(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    let mut perms = std::fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_module_fixture_layout() {
        let tmp = TempDir::new().unwrap();
        let dir = ModuleFixture::cxx("sys")
            .with_test("smoke.cpp")
            .write_to(tmp.path())
            .unwrap();

        assert!(dir.join("include/sys/sys.h").is_file());
        assert!(dir.join("source/sys.cpp").is_file());
        assert!(dir.join("tests/smoke.cpp").is_file());
    }
}
