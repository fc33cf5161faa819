//! Command implementations

pub mod configure;
pub mod header;
pub mod linkorder;
pub mod plan;
pub mod test;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::BuildDirArgs;
use modbuild::ops::configure::Configuration;
use modbuild::util::config::{global_config_path, load_config, project_config_path, Config};
use modbuild::util::diagnostic::{suggestions, Diagnostic};

/// The project root is the current directory.
pub fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("failed to get current directory")
}

/// User configuration for a project: global, then project overrides.
pub fn user_config(root: &Path) -> Config {
    load_config(global_config_path().as_deref(), &project_config_path(root))
}

/// Build directory from the command line, else the config, else `build`.
pub fn build_dir(root: &Path, args: &BuildDirArgs, config: &Config) -> PathBuf {
    match args.build_dir.as_ref().or(config.build.build_dir.as_ref()) {
        Some(dir) => root.join(dir),
        None => root.join("build"),
    }
}

/// Load the configuration written by `modbuild configure`.
pub fn load_configuration(root: &Path, args: &BuildDirArgs) -> Result<Configuration> {
    let dir = build_dir(root, args, &user_config(root));
    if !Configuration::file_in(&dir).exists() {
        return Err(Diagnostic::error(format!("project is not configured in {}", dir.display()))
            .with_suggestion(suggestions::NOT_CONFIGURED)
            .into());
    }
    Configuration::load(&dir)
}
