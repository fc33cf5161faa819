//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// modbuild - target-graph and toolchain configuration for C/C++ modules
#[derive(Parser)]
#[command(name = "modbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output; `configure` also turns on the compiler verbose flag
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the platform and compiler, run feature probes and freeze the variant
    Configure(ConfigureArgs),

    /// Declare every target in modbuild.toml and print the resolved build plan
    Plan(PlanArgs),

    /// Show the static link order for a target
    Linkorder(LinkorderArgs),

    /// Run built unit tests
    Test(TestArgs),

    /// Write a configuration header from the probed defines
    Header(HeaderArgs),
}

/// Options shared by commands that read a configured build directory.
#[derive(Args)]
pub struct BuildDirArgs {
    /// Build output directory (defaults to `build`)
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub build_dir: BuildDirArgs,

    /// Install prefix
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<PathBuf>,

    /// Force the platform id instead of detecting it
    #[arg(long, value_name = "ID")]
    pub platform: Option<String>,

    /// Enable compiler warnings
    #[arg(long)]
    pub enable_warnings: bool,

    /// Build with debugging information
    #[arg(long)]
    pub enable_debugging: bool,

    /// Build 64-bit code (Windows); elsewhere 64-bit is detected
    #[arg(long = "enable-64bit")]
    pub enable_64bit: bool,

    /// Force 32-bit code
    #[arg(long = "enable-32bit")]
    pub enable_32bit: bool,

    /// Look for doxygen
    #[arg(long)]
    pub enable_doxygen: bool,

    /// Extra C compiler flags
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub with_cflags: Option<String>,

    /// Extra C++ compiler flags
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub with_cxxflags: Option<String>,

    /// Extra linker flags
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub with_linkflags: Option<String>,

    /// Comma-separated defines for both C and C++
    #[arg(long, value_name = "DEFS")]
    pub with_defs: Option<String>,

    /// Optimization level for release builds
    #[arg(long, value_name = "LEVEL", value_parser = ["med", "fast", "fastest"])]
    pub with_optz: Option<String>,

    /// Windows C runtime
    #[arg(long, value_name = "CRT", value_parser = ["MT", "MD"])]
    pub with_crt: Option<String>,

    /// Skip the programs under each module's `tests/`
    #[arg(long)]
    pub libs_only: bool,

    /// Build module libraries as shared libraries
    #[arg(long)]
    pub shared: bool,

    /// Do not register unversioned library symlinks
    #[arg(long)]
    pub disable_symlinks: bool,

    /// Run unit tests after the build
    #[arg(long)]
    pub unittests: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub build_dir: BuildDirArgs,

    /// Write the plan to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LinkorderArgs {
    /// Target identity, e.g. `sys-c++` or `app`
    pub target: String,

    #[command(flatten)]
    pub build_dir: BuildDirArgs,
}

#[derive(Args)]
pub struct TestArgs {
    /// Directory holding the test binaries (defaults to every unit test
    /// directory of the configured project)
    pub dir: Option<PathBuf>,

    /// Test names to run from DIR
    #[arg(short, long = "test", value_name = "NAME", requires = "dir")]
    pub tests: Vec<String>,

    #[command(flatten)]
    pub build_dir: BuildDirArgs,
}

#[derive(Args)]
pub struct HeaderArgs {
    /// Header file to write
    pub output: PathBuf,

    /// Additional define, as KEY or KEY=VALUE
    #[arg(short = 'D', long = "define", value_name = "KEY[=VALUE]")]
    pub defines: Vec<String>,

    /// Append an `#undef` for this name
    #[arg(short = 'U', long = "undef", value_name = "NAME")]
    pub undefs: Vec<String>,

    /// Only write the defines given on the command line
    #[arg(long)]
    pub no_probes: bool,

    /// Copy this template instead, commenting out its `#undef` lines
    #[arg(long, value_name = "FILE", conflicts_with_all = ["defines", "undefs", "no_probes"])]
    pub template: Option<PathBuf>,

    #[command(flatten)]
    pub build_dir: BuildDirArgs,
}
