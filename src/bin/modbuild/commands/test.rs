//! `modbuild test` command

use anyhow::Result;

use crate::cli::TestArgs;
use modbuild::builder::PostBuildAction;
use modbuild::core::{Manifest, MANIFEST_NAME};
use modbuild::ops::plan::build_graph;
use modbuild::ops::test_runner::{run_post_build_actions, run_tests, TestSummary};

use super::{load_configuration, project_root};

pub fn execute(args: TestArgs) -> Result<()> {
    let root = project_root()?;
    let configuration = load_configuration(&root, &args.build_dir)?;
    let platform = configuration.platform();

    let summaries: Vec<TestSummary> = match args.dir {
        Some(dir) => vec![run_tests(&args.tests, &root.join(dir), &platform)],
        None => {
            // Every unit test directory, whether or not auto-run was configured.
            let mut configuration = configuration;
            configuration.unittests = true;
            let manifest = Manifest::load(&root.join(MANIFEST_NAME))?;
            let graph = build_graph(&manifest, &configuration)?;
            let actions: Vec<PostBuildAction> = graph.post_build_actions().to_vec();
            run_post_build_actions(&actions, &platform)
        }
    };

    let mut failed = 0;
    let mut ran = 0;
    for summary in &summaries {
        if summary.total() > 0 {
            println!("Running Unit Tests: {}", summary.dir.display());
        }
        print!("{}", summary);
        failed += summary.failed.len();
        ran += summary.total();
    }

    if ran > 0 && failed > 0 {
        anyhow::bail!("{} of {} test(s) failed", failed, ran);
    }
    Ok(())
}
