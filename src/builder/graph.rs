//! The target graph.
//!
//! Declaration operations register targets, install records and post-build
//! actions. Every target takes a private copy of its variant environment, so
//! nothing a target adds can leak into another.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::variant::Variant;
use crate::core::env::Environment;
use crate::core::manifest::{ModuleArgs, PluginArgs, ProgramArgs, UnitTestArgs};
use crate::core::target::{
    InstallEntry, Language, LinkInputs, SymlinkEntry, Target, TargetId, TargetKind,
};
use crate::core::Platform;
use crate::util::fs::{list_files, relative_path};

/// Uselib tokens every target carries for the platform runtime.
pub const RUNTIME_USELIB: [&str; 2] = ["CSTD", "CRUN"];

/// Uselib token that marks unit-test executables.
pub const UNITTEST_USELIB: &str = "UNITTEST";

/// Define added to every plugin.
pub const PLUGIN_EXPORTS_DEFINE: &str = "PLUGIN_MODULE_EXPORTS";

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w]").expect("valid version regex"));

/// Errors raised while declaring targets.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{operation} declaration is missing a `{field}`")]
    MissingName {
        operation: &'static str,
        field: &'static str,
    },

    #[error("variant `{0}` has not been configured")]
    UnknownVariant(String),
}

/// Graph-construction switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Project root; declaration paths are relative to it
    pub root: PathBuf,
    /// Root of the build output tree
    pub build_dir: PathBuf,
    /// Skip the programs under each module's `tests/`
    pub libs_only: bool,
    /// Register unversioned symlinks for versioned libraries
    pub symlinks: bool,
    /// Run unit tests after the build
    pub unittests: bool,
}

impl GraphOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        GraphOptions {
            build_dir: root.join("build"),
            root,
            libs_only: false,
            symlinks: true,
            unittests: false,
        }
    }
}

/// Work the build engine performs once artifacts exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PostBuildAction {
    /// Run the named test executables found in `dir`
    RunUnitTests { tests: Vec<String>, dir: PathBuf },
}

/// All declared targets and what goes with them.
#[derive(Debug)]
pub struct TargetGraph {
    platform: Platform,
    options: GraphOptions,
    variants: BTreeMap<String, Environment>,
    default_variant: Option<String>,
    targets: Vec<Target>,
    by_name: HashMap<TargetId, usize>,
    installs: Vec<InstallEntry>,
    symlinks: Vec<SymlinkEntry>,
    post_build: Vec<PostBuildAction>,
}

impl TargetGraph {
    pub fn new(platform: Platform, options: GraphOptions) -> Self {
        TargetGraph {
            platform,
            options,
            variants: BTreeMap::new(),
            default_variant: None,
            targets: Vec::new(),
            by_name: HashMap::new(),
            installs: Vec::new(),
            symlinks: Vec::new(),
            post_build: Vec::new(),
        }
    }

    /// Register a frozen variant. The first one registered becomes the
    /// default for declarations that do not name a variant.
    pub fn add_variant(&mut self, variant: Variant) {
        if self.default_variant.is_none() {
            self.default_variant = Some(variant.name.clone());
        }
        self.variants.insert(variant.name, variant.env);
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub(crate) fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    /// Look up a target by identity. With duplicate declarations the latest
    /// one wins.
    pub fn get(&self, id: &str) -> Option<&Target> {
        self.index_of(id).map(|i| &self.targets[i])
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.by_name.get(&TargetId::from(id)).copied()
    }

    pub fn installs(&self) -> &[InstallEntry] {
        &self.installs
    }

    pub fn symlinks(&self) -> &[SymlinkEntry] {
        &self.symlinks
    }

    pub fn post_build_actions(&self) -> &[PostBuildAction] {
        &self.post_build
    }

    fn env_for(&self, variant: Option<&str>) -> Result<Environment, GraphError> {
        match variant.or(self.default_variant.as_deref()) {
            Some(name) => self
                .variants
                .get(name)
                .cloned()
                .ok_or_else(|| GraphError::UnknownVariant(name.to_string())),
            None => Ok(Environment::new(self.platform.id())),
        }
    }

    fn resolve_dir(&self, path: Option<&Path>) -> PathBuf {
        match path {
            Some(p) => self.options.root.join(p),
            None => self.options.root.clone(),
        }
    }

    /// Output directory of a source directory:
    /// `<build_dir>/<variant>/<path relative to the project root>`.
    pub fn build_dir_for(&self, env: &Environment, dir: &Path) -> PathBuf {
        let variant = env.variant.as_deref().unwrap_or("default");
        self.options
            .build_dir
            .join(variant)
            .join(relative_path(&self.options.root, dir))
    }

    fn add_target(&mut self, target: Target) -> usize {
        if self.by_name.contains_key(&target.id) {
            tracing::warn!("target `{}` declared more than once", target.id);
        }
        tracing::debug!("declared {} `{}`", target.kind, target.id);

        let index = self.targets.len();
        self.by_name.insert(target.id.clone(), index);
        self.targets.push(target);
        index
    }

    fn install_tree(&mut self, dir: &Path, base: &Path, dest: Option<&Path>) {
        for file in list_files(dir, None) {
            let dest_dir = match dest {
                Some(d) => d.to_path_buf(),
                None => relative_path(base, &file)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            };
            self.installs.push(InstallEntry {
                source: file,
                dest_dir,
            });
        }
    }

    /// Declare a library module together with the programs in its `tests/`
    /// directory and the unit tests in its `unittests/` directory.
    ///
    /// Returns the variant environment the module was declared in.
    pub fn declare_module(&mut self, args: &ModuleArgs) -> Result<Environment, GraphError> {
        require("module", "name", &args.name)?;
        let env = self.env_for(args.variant.as_deref())?;
        let lang = args.lang;
        let dir = self.resolve_dir(args.path.as_deref());
        let lib_name = lang.qualify(&args.name);

        let artifact = match &args.version {
            Some(version) if !self.platform.is_windows() => {
                format!("{}.{}", lib_name, safe_version(version))
            }
            _ => lib_name.clone(),
        };

        if !args.headersonly {
            let kind = env.lib_type;
            let sources = discover_sources(
                &dir,
                args.source_dir.as_deref(),
                args.source_filter.as_deref(),
                lang,
            );
            let target = Target {
                id: TargetId::new(lib_name.clone()),
                kind,
                lang,
                artifact: artifact.clone(),
                path: dir.clone(),
                sources,
                includes: dirs(&dir, args.includes.as_deref()),
                export_includes: dirs(&dir, args.export_includes.as_deref()),
                defines: target_defines(&env, lang, &args.defines),
                deps: local_deps(lang, &args.module_deps, &args.uselib_local),
                uselib: with_runtime(&args.uselib),
                install_path: Some(PathBuf::from("lib")),
                version: args.version.clone(),
                link: LinkInputs {
                    system_libs: env.libs_for(&with_runtime(&args.uselib)),
                    ..LinkInputs::default()
                },
                env: env.clone(),
            };
            self.add_target(target);

            if args.version.is_some() && !self.platform.is_windows() && self.options.symlinks {
                self.symlinks.push(SymlinkEntry {
                    link: PathBuf::from("lib").join(self.platform.artifact_filename(kind, &lib_name)),
                    points_to: self.platform.artifact_filename(kind, &artifact),
                });
            }
        }

        let include_dir = dir.join("include");
        self.install_tree(&include_dir, &dir, None);

        let mut test_deps_base = args.module_deps.clone();
        if !args.headersonly {
            test_deps_base.push(args.name.clone());
        }

        let tests_dir = dir.join("tests");
        if tests_dir.is_dir() && !self.options.libs_only {
            let mut test_deps = args.test_deps.clone().unwrap_or_else(|| args.module_deps.clone());
            if !args.headersonly {
                test_deps.push(args.name.clone());
            }

            for file in test_sources(&tests_dir, lang, args.test_filter.as_deref()) {
                self.declare_program(&ProgramArgs {
                    name: file_stem(&file),
                    lang,
                    path: Some(tests_dir.clone()),
                    source: vec![file_name(&file)],
                    module_deps: test_deps.clone(),
                    uselib_local: args.test_uselib_local.clone(),
                    uselib: args.test_uselib.clone().unwrap_or_else(|| args.uselib.clone()),
                    install_path: Some(PathBuf::from("share").join(&args.name).join("test")),
                    variant: args.variant.clone(),
                    ..ProgramArgs::default()
                })?;
            }
        }

        let unittests_dir = dir.join("unittests");
        if unittests_dir.is_dir() {
            let mut tests = Vec::new();
            for file in test_sources(&unittests_dir, lang, args.unittest_filter.as_deref()) {
                self.declare_unit_test(&UnitTestArgs {
                    test: file_name(&file),
                    lang,
                    path: Some(unittests_dir.clone()),
                    module_deps: test_deps_base.clone(),
                    uselib: args.uselib.clone(),
                    disabled: true,
                    variant: args.variant.clone(),
                })?;
                tests.push(file_stem(&file));
            }

            if self.options.unittests && !tests.is_empty() {
                let dir = self.build_dir_for(&env, &unittests_dir);
                self.post_build.push(PostBuildAction::RunUnitTests { tests, dir });
            }
        }

        Ok(env)
    }

    /// Declare a plugin: a shared library installed by plugin type, with its
    /// `conf/` directory mirrored alongside.
    pub fn declare_plugin(&mut self, args: &PluginArgs) -> Result<&Target, GraphError> {
        require("plugin", "name", &args.name)?;
        let env = self.env_for(args.variant.as_deref())?;
        let lang = args.lang;
        let dir = self.resolve_dir(args.path.as_deref());
        let lib_name = lang.qualify(&args.name);

        let sources = explicit_or_discovered(
            &dir,
            &args.source,
            args.source_dir.as_deref(),
            args.source_filter.as_deref(),
            lang,
        );
        let mut defines = target_defines(&env, lang, &args.defines);
        defines.push(PLUGIN_EXPORTS_DEFINE.to_string());
        let uselib = with_runtime(&args.uselib);
        let share = PathBuf::from("share").join(&args.plugin);

        let target = Target {
            id: TargetId::new(lib_name.clone()),
            kind: TargetKind::SharedLib,
            lang,
            artifact: lib_name,
            path: dir.clone(),
            sources,
            includes: dirs(&dir, args.includes.as_deref()),
            export_includes: dirs(&dir, args.export_includes.as_deref()),
            defines,
            deps: local_deps(lang, &args.module_deps, &args.uselib_local),
            link: LinkInputs {
                system_libs: env.libs_for(&uselib),
                ..LinkInputs::default()
            },
            uselib,
            install_path: Some(share.join("plugins")),
            version: None,
            env,
        };
        let index = self.add_target(target);

        let conf_dir = dir.join("conf");
        self.install_tree(&conf_dir, &dir, Some(&share.join("conf")));

        Ok(&self.targets[index])
    }

    /// Declare a program, installed to `bin` unless told otherwise.
    pub fn declare_program(&mut self, args: &ProgramArgs) -> Result<&Target, GraphError> {
        require("program", "name", &args.name)?;
        let install_path = if args.no_install {
            None
        } else {
            Some(args.install_path.clone().unwrap_or_else(|| PathBuf::from("bin")))
        };
        let index = self.push_executable(args, TargetKind::Program, install_path)?;
        Ok(&self.targets[index])
    }

    /// Declare a unit test: a single-source program tagged `UNITTEST`.
    ///
    /// Unless disabled, it is scheduled to run after the build when
    /// unit-test execution is enabled.
    pub fn declare_unit_test(&mut self, args: &UnitTestArgs) -> Result<&Target, GraphError> {
        require("unittest", "test", &args.test)?;
        let name = file_stem(Path::new(&args.test));
        let mut uselib = args.uselib.clone();
        uselib.push(UNITTEST_USELIB.to_string());

        let program = ProgramArgs {
            name: name.clone(),
            lang: args.lang,
            path: args.path.clone(),
            source: vec![args.test.clone()],
            module_deps: args.module_deps.clone(),
            uselib,
            variant: args.variant.clone(),
            ..ProgramArgs::default()
        };
        let index = self.push_executable(&program, TargetKind::Test, None)?;

        if !args.disabled && self.options.unittests {
            let target = &self.targets[index];
            let dir = self.build_dir_for(&target.env, &target.path);
            self.post_build.push(PostBuildAction::RunUnitTests {
                tests: vec![name],
                dir,
            });
        }

        Ok(&self.targets[index])
    }

    fn push_executable(
        &mut self,
        args: &ProgramArgs,
        kind: TargetKind,
        install_path: Option<PathBuf>,
    ) -> Result<usize, GraphError> {
        let env = self.env_for(args.variant.as_deref())?;
        let lang = args.lang;
        let dir = self.resolve_dir(args.path.as_deref());
        let sources = explicit_or_discovered(
            &dir,
            &args.source,
            args.source_dir.as_deref(),
            args.source_filter.as_deref(),
            lang,
        );
        let uselib = with_runtime(&args.uselib);

        let target = Target {
            id: TargetId::new(args.name.clone()),
            kind,
            lang,
            artifact: args.name.clone(),
            path: dir.clone(),
            sources,
            includes: dirs(&dir, args.includes.as_deref()),
            export_includes: Vec::new(),
            defines: target_defines(&env, lang, &args.defines),
            deps: local_deps(lang, &args.module_deps, &args.uselib_local),
            link: LinkInputs {
                system_libs: env.libs_for(&uselib),
                ..LinkInputs::default()
            },
            uselib,
            install_path,
            version: None,
            env,
        };
        Ok(self.add_target(target))
    }
}

fn require(operation: &'static str, field: &'static str, value: &str) -> Result<(), GraphError> {
    if value.trim().is_empty() {
        return Err(GraphError::MissingName { operation, field });
    }
    Ok(())
}

/// Replace every non-word character of a version string with `.`.
pub fn safe_version(version: &str) -> String {
    NON_WORD_RE.replace_all(version, ".").into_owned()
}

/// Defines for one target: its compiler family's set, then the probed
/// defines, then the target's own.
fn target_defines(env: &Environment, lang: Language, extra: &[String]) -> Vec<String> {
    let mut defines: Vec<String> = env.lang(lang).defines.as_slice().to_vec();
    for token in env.define_tokens().into_iter().chain(extra.iter().cloned()) {
        if !defines.contains(&token) {
            defines.push(token);
        }
    }
    defines
}

fn local_deps(lang: Language, module_deps: &[String], uselib_local: &[String]) -> Vec<TargetId> {
    module_deps
        .iter()
        .map(|dep| TargetId::new(lang.qualify(dep)))
        .chain(uselib_local.iter().map(|dep| TargetId::new(dep.clone())))
        .collect()
}

fn with_runtime(uselib: &[String]) -> Vec<String> {
    let mut tokens = uselib.to_vec();
    tokens.extend(RUNTIME_USELIB.iter().map(|t| t.to_string()));
    tokens
}

fn dirs(base: &Path, names: Option<&[String]>) -> Vec<PathBuf> {
    match names {
        Some(names) => names.iter().map(|n| base.join(n)).collect(),
        None => vec![base.join("include")],
    }
}

fn matches_filter(path: &Path, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match glob::Pattern::new(filter) {
        Ok(pattern) => pattern.matches(&file_name(path)),
        Err(e) => {
            tracing::warn!("invalid filter `{}`: {}", filter, e);
            false
        }
    }
}

fn discover_sources(
    dir: &Path,
    source_dir: Option<&Path>,
    filter: Option<&str>,
    lang: Language,
) -> Vec<PathBuf> {
    let root = dir.join(source_dir.unwrap_or(Path::new("source")));
    list_files(&root, None)
        .into_iter()
        .filter(|f| {
            f.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| lang.source_extensions().contains(&e))
        })
        .filter(|f| matches_filter(f, filter))
        .collect()
}

fn explicit_or_discovered(
    dir: &Path,
    source: &[String],
    source_dir: Option<&Path>,
    filter: Option<&str>,
    lang: Language,
) -> Vec<PathBuf> {
    if source.is_empty() {
        discover_sources(dir, source_dir, filter, lang)
    } else {
        source.iter().map(|s| dir.join(s)).collect()
    }
}

fn test_sources(dir: &Path, lang: Language, filter: Option<&str>) -> Vec<PathBuf> {
    list_files(dir, Some(1))
        .into_iter()
        .filter(|f| f.extension().and_then(|e| e.to_str()) == Some(lang.test_extension()))
        .filter(|f| matches_filter(f, filter))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ModuleFixture;
    use tempfile::TempDir;

    fn variant(platform: &str) -> Variant {
        let mut env = Environment::new(platform);
        env.defines.define("HAVE_FOO", 1);
        env.defines.define("BAR", "2");
        env.defines.undefine("HAVE_MISSING");
        env.add_libs("THREAD", ["pthread"]);
        env.variant = Some(format!("{}-release", platform));
        Variant {
            name: format!("{}-release", platform),
            env,
        }
    }

    fn graph(root: &Path, platform: &str) -> TargetGraph {
        let mut graph = TargetGraph::new(Platform::new(platform), GraphOptions::new(root));
        graph.add_variant(variant(platform));
        graph
    }

    fn module(name: &str) -> ModuleArgs {
        ModuleArgs {
            name: name.to_string(),
            path: Some(PathBuf::from(name)),
            ..ModuleArgs::default()
        }
    }

    #[test]
    fn test_module_identity_defines_and_deps() {
        let tmp = TempDir::new().unwrap();
        ModuleFixture::cxx("sys").write_to(tmp.path()).unwrap();
        let mut graph = graph(tmp.path(), "linux");

        let mut args = module("sys");
        args.module_deps = vec!["except".into()];
        args.uselib_local = vec!["zlib-c".into()];
        args.uselib = vec!["THREAD".into()];
        args.defines = vec!["EXTRA=1".into()];
        let env = graph.declare_module(&args).unwrap();
        assert_eq!(env.variant.as_deref(), Some("linux-release"));

        let target = graph.get("sys-c++").unwrap();
        assert_eq!(target.kind, TargetKind::StaticLib);
        assert_eq!(target.defines, vec!["HAVE_FOO", "BAR=2", "EXTRA=1"]);
        assert_eq!(target.deps, vec![TargetId::from("except-c++"), TargetId::from("zlib-c")]);
        assert_eq!(target.uselib, vec!["THREAD", "CSTD", "CRUN"]);
        assert_eq!(target.link.system_libs, vec!["pthread"]);
        assert_eq!(target.includes, vec![tmp.path().join("sys/include")]);
        assert_eq!(target.sources, vec![tmp.path().join("sys/source/sys.cpp")]);
        assert_eq!(target.install_path, Some(PathBuf::from("lib")));

        let install = &graph.installs()[0];
        assert_eq!(install.dest_dir, PathBuf::from("include/sys"));
    }

    #[test]
    fn test_languages_are_distinct_targets() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        graph.declare_module(&module("mem")).unwrap();
        let mut c = module("mem");
        c.lang = Language::C;
        graph.declare_module(&c).unwrap();

        assert!(graph.get("mem-c++").is_some());
        assert!(graph.get("mem-c").is_some());
        assert_eq!(graph.targets().len(), 2);
    }

    #[test]
    fn test_versioned_artifact_and_symlink() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let mut args = module("io");
        args.version = Some("1.0-beta".into());
        graph.declare_module(&args).unwrap();

        assert_eq!(graph.get("io-c++").unwrap().artifact, "io-c++.1.0.beta");
        assert_eq!(
            graph.symlinks(),
            &[SymlinkEntry {
                link: PathBuf::from("lib/libio-c++.a"),
                points_to: "libio-c++.1.0.beta.a".into(),
            }]
        );
    }

    #[test]
    fn test_windows_suppresses_versioning() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "win32");
        let mut args = module("io");
        args.version = Some("2.1".into());
        graph.declare_module(&args).unwrap();

        assert_eq!(graph.get("io-c++").unwrap().artifact, "io-c++");
        assert!(graph.symlinks().is_empty());
    }

    #[test]
    fn test_module_tests_and_unittests() {
        let tmp = TempDir::new().unwrap();
        ModuleFixture::cxx("str")
            .with_test("smoke.cpp")
            .with_test("notes.txt")
            .with_unittest("test_split.cpp")
            .with_unittest("test_join.cpp")
            .write_to(tmp.path())
            .unwrap();

        let mut options = GraphOptions::new(tmp.path());
        options.unittests = true;
        let mut graph = TargetGraph::new(Platform::new("linux"), options);
        graph.add_variant(variant("linux"));
        let mut args = module("str");
        args.module_deps = vec!["sys".into()];
        graph.declare_module(&args).unwrap();

        let smoke = graph.get("smoke").unwrap();
        assert_eq!(smoke.kind, TargetKind::Program);
        assert_eq!(smoke.deps, vec![TargetId::from("sys-c++"), TargetId::from("str-c++")]);
        assert_eq!(smoke.install_path, Some(PathBuf::from("share/str/test")));

        let unit = graph.get("test_split").unwrap();
        assert_eq!(unit.kind, TargetKind::Test);
        assert!(unit.uses(UNITTEST_USELIB));
        assert!(unit.install_path.is_none());

        assert_eq!(
            graph.post_build_actions(),
            &[PostBuildAction::RunUnitTests {
                tests: vec!["test_join".into(), "test_split".into()],
                dir: tmp.path().join("build/linux-release/str/unittests"),
            }]
        );
    }

    #[test]
    fn test_libs_only_skips_tests() {
        let tmp = TempDir::new().unwrap();
        ModuleFixture::cxx("str")
            .with_test("smoke.cpp")
            .write_to(tmp.path())
            .unwrap();

        let mut options = GraphOptions::new(tmp.path());
        options.libs_only = true;
        let mut graph = TargetGraph::new(Platform::new("linux"), options);
        graph.declare_module(&module("str")).unwrap();

        assert!(graph.get("smoke").is_none());
        assert!(graph.post_build_actions().is_empty());
    }

    #[test]
    fn test_headers_only_module() {
        let tmp = TempDir::new().unwrap();
        ModuleFixture::cxx("hdr")
            .with_test("smoke.cpp")
            .write_to(tmp.path())
            .unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let mut args = module("hdr");
        args.headersonly = true;
        graph.declare_module(&args).unwrap();

        assert!(graph.get("hdr-c++").is_none());
        assert!(graph.get("smoke").unwrap().deps.is_empty());
        assert_eq!(graph.installs().len(), 1);
    }

    #[test]
    fn test_plugin_declaration() {
        let tmp = TempDir::new().unwrap();
        ModuleFixture::cxx("png")
            .with_file("conf/png.cfg", "quality=9\n")
            .write_to(tmp.path())
            .unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let target = graph
            .declare_plugin(&PluginArgs {
                name: "png".into(),
                plugin: "image".into(),
                path: Some("png".into()),
                ..PluginArgs::default()
            })
            .unwrap();

        assert_eq!(target.kind, TargetKind::SharedLib);
        assert!(target.defines.contains(&PLUGIN_EXPORTS_DEFINE.to_string()));
        assert_eq!(target.install_path, Some(PathBuf::from("share/image/plugins")));
        assert!(graph
            .installs()
            .iter()
            .any(|i| i.dest_dir == Path::new("share/image/conf") && i.source.ends_with("png.cfg")));
    }

    #[test]
    fn test_program_install_and_explicit_sources() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let target = graph
            .declare_program(&ProgramArgs {
                name: "tool".into(),
                source: vec!["main.cpp".into(), "util.cpp".into()],
                ..ProgramArgs::default()
            })
            .unwrap();
        assert_eq!(target.install_path, Some(PathBuf::from("bin")));
        assert_eq!(target.sources.len(), 2);

        let target = graph
            .declare_program(&ProgramArgs {
                name: "helper".into(),
                no_install: true,
                ..ProgramArgs::default()
            })
            .unwrap();
        assert!(target.install_path.is_none());
    }

    #[test]
    fn test_unit_test_auto_run_registration() {
        let tmp = TempDir::new().unwrap();
        let mut options = GraphOptions::new(tmp.path());
        options.unittests = true;
        let mut graph = TargetGraph::new(Platform::new("linux"), options);
        graph.add_variant(variant("linux"));

        graph
            .declare_unit_test(&UnitTestArgs {
                test: "check_all.cpp".into(),
                path: Some("t".into()),
                ..UnitTestArgs::default()
            })
            .unwrap();
        graph
            .declare_unit_test(&UnitTestArgs {
                test: "quiet.cpp".into(),
                disabled: true,
                ..UnitTestArgs::default()
            })
            .unwrap();

        assert_eq!(
            graph.post_build_actions(),
            &[PostBuildAction::RunUnitTests {
                tests: vec!["check_all".into()],
                dir: tmp.path().join("build/linux-release/t"),
            }]
        );
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let err = graph.declare_module(&ModuleArgs::default()).unwrap_err();
        assert!(matches!(err, GraphError::MissingName { operation: "module", .. }));
        assert!(graph.declare_unit_test(&UnitTestArgs::default()).is_err());
    }

    #[test]
    fn test_unknown_variant() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        let mut args = module("sys");
        args.variant = Some("linux-debug".into());
        assert!(matches!(
            graph.declare_module(&args),
            Err(GraphError::UnknownVariant(ref v)) if v == "linux-debug"
        ));
    }

    #[test]
    fn test_duplicate_declaration_latest_wins() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        graph.declare_module(&module("dup")).unwrap();
        let mut second = module("dup");
        second.defines = vec!["SECOND".into()];
        graph.declare_module(&second).unwrap();

        assert_eq!(graph.targets().len(), 2);
        assert!(graph
            .get("dup-c++")
            .unwrap()
            .defines
            .contains(&"SECOND".to_string()));
    }

    #[test]
    fn test_private_environment_copies() {
        let tmp = TempDir::new().unwrap();
        let mut graph = graph(tmp.path(), "linux");
        graph.declare_module(&module("a")).unwrap();
        graph.declare_module(&module("b")).unwrap();

        graph.targets_mut()[0].env.cxx.flags.append(["-DONLY_A"]);
        assert!(!graph.get("b-c++").unwrap().env.cxx.flags.contains("-DONLY_A"));
    }

    #[test]
    fn test_family_defines_stay_with_their_language() {
        let tmp = TempDir::new().unwrap();
        let mut v = variant("linux");
        v.env.cxx.defines.append(["__POSIX", "CXX_ONLY=1"]);
        v.env.c.defines.append(["__POSIX"]);
        let mut graph = TargetGraph::new(Platform::new("linux"), GraphOptions::new(tmp.path()));
        graph.add_variant(v);

        graph.declare_module(&module("mem")).unwrap();
        let mut c = module("mem");
        c.lang = Language::C;
        graph.declare_module(&c).unwrap();

        let cxx = graph.get("mem-c++").unwrap();
        assert_eq!(cxx.defines, vec!["__POSIX", "CXX_ONLY=1", "HAVE_FOO", "BAR=2"]);
        let c = graph.get("mem-c").unwrap();
        assert_eq!(c.defines, vec!["__POSIX", "HAVE_FOO", "BAR=2"]);
    }
}
