//! Running built unit tests.
//!
//! Test binaries report per-case results as plain lines containing `PASSED`
//! or `FAILED`. A binary that exits non-zero without any `FAILED` line is
//! reported as a single synthesized failure carrying its exit code.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::PostBuildAction;
use crate::core::Platform;
use crate::util::fs::{is_executable, list_files};
use crate::util::process::Subprocess;

/// One reported line, tagged with the binary that printed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub binary: String,
    pub message: String,
}

/// Outcome of one test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub dir: PathBuf,
    pub passed: Vec<TestCase>,
    pub failed: Vec<TestCase>,
}

impl TestSummary {
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// Percentage of passing cases; 0 when nothing ran.
    pub fn pass_percentage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => 100.0 * self.passed.len() as f64 / total as f64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return writeln!(f, "No tests found");
        }
        writeln!(
            f,
            "Results: {} of {} Test(s) Passed ({:.2}%)",
            self.passed.len(),
            self.total(),
            self.pass_percentage()
        )?;
        for case in &self.failed {
            writeln!(f, "{} --> {}", case.binary, case.message)?;
        }
        Ok(())
    }
}

/// Find the test executables named in `expected` directly inside `dir`.
///
/// Names match on the file stem. Where executables carry a suffix only
/// files with that suffix qualify; elsewhere the full file name must match.
pub fn discover_tests(expected: &[String], dir: &Path, platform: &Platform) -> Vec<PathBuf> {
    let suffix = platform.exe_suffix();

    list_files(dir, Some(1))
        .into_iter()
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
            if !expected.iter().any(|e| e == stem) || !is_executable(path) {
                return false;
            }
            if suffix.is_empty() {
                expected.iter().any(|e| e == name)
            } else {
                name.ends_with(suffix)
            }
        })
        .collect()
}

/// Run every discovered test binary in `dir` and collect the results.
///
/// A failing binary never stops the run.
pub fn run_tests(expected: &[String], dir: &Path, platform: &Platform) -> TestSummary {
    let mut summary = TestSummary {
        dir: dir.to_path_buf(),
        ..TestSummary::default()
    };

    let binaries = discover_tests(expected, dir, platform);
    if binaries.is_empty() {
        tracing::debug!("no test binaries in {}", dir.display());
        return summary;
    }

    tracing::info!("Running Unit Tests: {}", dir.display());
    for binary in binaries {
        run_one(&binary, dir, &mut summary);
    }
    summary
}

fn run_one(binary: &Path, dir: &Path, summary: &mut TestSummary) {
    let name = binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tagged = |message: &str| TestCase {
        binary: name.clone(),
        message: message.to_string(),
    };

    let output = match Subprocess::new(binary).cwd(dir).run() {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("could not run {}: {:#}", binary.display(), e);
            summary.failed.push(tagged(&format!("FAILURE: {:#}", e)));
            return;
        }
    };

    let lines: Vec<&str> = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .collect();

    summary.passed.extend(
        lines
            .iter()
            .filter(|line| line.contains("PASSED"))
            .map(|line| tagged(line)),
    );

    if !output.success() {
        let code = output.code.unwrap_or(-1);
        tracing::debug!("{} exited with {}", name, code);

        let before = summary.failed.len();
        summary.failed.extend(
            lines
                .iter()
                .filter(|line| line.contains("FAILED"))
                .map(|line| tagged(line)),
        );
        if summary.failed.len() == before {
            summary
                .failed
                .push(tagged(&format!("FAILURE: {} : {}", code, output.stderr.trim())));
        }
    }
}

/// Run the post-build actions the graph registered, in order.
pub fn run_post_build_actions(actions: &[PostBuildAction], platform: &Platform) -> Vec<TestSummary> {
    actions
        .iter()
        .map(|action| match action {
            PostBuildAction::RunUnitTests { tests, dir } => run_tests(tests, dir, platform),
        })
        .collect()
}
