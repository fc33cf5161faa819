//! Implementation of `modbuild plan`.
//!
//! Loads the manifest against a saved configuration, declares every target,
//! resolves link orders and renders the result for the build engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::{LinkOrder, PostBuildAction, TargetGraph};
use crate::core::{Language, Manifest, Target, TargetId, TargetKind, MANIFEST_NAME};
use crate::ops::configure::Configuration;

/// One target as the build engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTarget {
    pub id: TargetId,
    pub kind: TargetKind,
    pub lang: Language,
    /// Output file name
    pub output: String,
    /// Directory the output is produced in
    pub output_dir: PathBuf,
    pub sources: Vec<PathBuf>,
    pub includes: Vec<PathBuf>,
    pub compile_flags: Vec<String>,
    pub defines: Vec<String>,
    pub link_flags: Vec<String>,
    /// Local static libraries in single-pass linker order
    pub static_libs: Vec<String>,
    pub shared_libs: Vec<String>,
    pub system_libs: Vec<String>,
    /// Dependency names that matched no declared target
    pub unresolved: Vec<String>,
    /// Absolute install directory, if installed
    pub install_dir: Option<PathBuf>,
}

/// A file or symlink placed under the install prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InstallStep {
    Copy { source: PathBuf, dest_dir: PathBuf },
    Symlink { link: PathBuf, points_to: String },
}

/// The fully resolved build description of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub platform: String,
    pub variant: String,
    pub targets: Vec<PlannedTarget>,
    pub install: Vec<InstallStep>,
    pub post_build: Vec<PostBuildAction>,
}

impl BuildPlan {
    pub fn target(&self, id: &str) -> Option<&PlannedTarget> {
        self.targets.iter().rev().find(|t| t.id.as_str() == id)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize build plan")
    }
}

/// Declare every entry of `manifest` in a graph built from `config`.
///
/// Modules come first so that programs, plugins and unit tests can depend
/// on them.
pub fn build_graph(manifest: &Manifest, config: &Configuration) -> Result<TargetGraph> {
    let mut graph = TargetGraph::new(config.platform(), config.graph_options());
    graph.add_variant(config.variant.clone());

    for module in &manifest.modules {
        graph
            .declare_module(module)
            .with_context(|| format!("failed to declare module `{}`", module.name))?;
    }
    for plugin in &manifest.plugins {
        graph
            .declare_plugin(plugin)
            .with_context(|| format!("failed to declare plugin `{}`", plugin.name))?;
    }
    for program in &manifest.programs {
        graph
            .declare_program(program)
            .with_context(|| format!("failed to declare program `{}`", program.name))?;
    }
    for test in &manifest.unittests {
        graph
            .declare_unit_test(test)
            .with_context(|| format!("failed to declare unit test `{}`", test.test))?;
    }

    tracing::debug!("declared {} targets", graph.targets().len());
    Ok(graph)
}

/// Resolve a declared graph into a plan.
pub fn plan_graph(mut graph: TargetGraph, config: &Configuration) -> Result<BuildPlan> {
    let orders = graph.resolve_link_orders()?;

    let targets = graph
        .targets()
        .iter()
        .zip(&orders)
        .map(|(target, (_, order))| planned(&graph, target, order, &config.prefix))
        .collect();

    let mut install: Vec<InstallStep> = graph
        .installs()
        .iter()
        .map(|entry| InstallStep::Copy {
            source: entry.source.clone(),
            dest_dir: config.prefix.join(&entry.dest_dir),
        })
        .collect();
    install.extend(graph.symlinks().iter().map(|link| InstallStep::Symlink {
        link: config.prefix.join(&link.link),
        points_to: link.points_to.clone(),
    }));

    Ok(BuildPlan {
        platform: config.platform.clone(),
        variant: config.variant.name.clone(),
        targets,
        install,
        post_build: graph.post_build_actions().to_vec(),
    })
}

fn planned(graph: &TargetGraph, target: &Target, order: &LinkOrder, prefix: &Path) -> PlannedTarget {
    PlannedTarget {
        id: target.id.clone(),
        kind: target.kind,
        lang: target.lang,
        output: target.output_filename(graph.platform()),
        output_dir: graph.build_dir_for(&target.env, &target.path),
        sources: target.sources.clone(),
        includes: target.includes.clone(),
        compile_flags: target.compile_flags(),
        defines: target.defines.clone(),
        link_flags: target.env.link_flags.as_slice().to_vec(),
        static_libs: target.link.static_libs.clone(),
        shared_libs: target.link.shared_libs.clone(),
        system_libs: target.link.system_libs.clone(),
        unresolved: order
            .unresolved
            .iter()
            .map(|id| id.as_str().to_string())
            .collect(),
        install_dir: target.install_path.as_ref().map(|p| prefix.join(p)),
    }
}

/// Load the manifest under `root` and plan it against `config`.
pub fn plan(root: &Path, config: &Configuration) -> Result<BuildPlan> {
    let manifest_path = root.join(MANIFEST_NAME);
    let manifest = Manifest::load(&manifest_path)?;
    let graph = build_graph(&manifest, config)?;
    plan_graph(graph, config)
}
