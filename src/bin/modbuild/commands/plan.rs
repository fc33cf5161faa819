//! `modbuild plan` command

use anyhow::Result;

use crate::cli::PlanArgs;
use modbuild::core::MANIFEST_NAME;
use modbuild::ops::plan::plan;
use modbuild::util::diagnostic::{emit, suggestions, Diagnostic};
use modbuild::util::fs::write_string;

use super::{load_configuration, project_root};

pub fn execute(args: PlanArgs, color: bool) -> Result<()> {
    let root = project_root()?;
    let manifest = root.join(MANIFEST_NAME);
    if !manifest.exists() {
        return Err(Diagnostic::error(format!(
            "could not find `{}` in {}",
            MANIFEST_NAME,
            root.display()
        ))
        .with_suggestion(suggestions::NO_MANIFEST)
        .into());
    }

    let configuration = load_configuration(&root, &args.build_dir)?;
    let plan = plan(&root, &configuration)?;

    for target in &plan.targets {
        for missing in &target.unresolved {
            let diag = Diagnostic::warning(format!(
                "`{}` depends on `{}`, which is not declared",
                target.id, missing
            ))
            .with_context("dependency names are qualified by language")
            .with_suggestion(suggestions::UNRESOLVED_DEPENDENCY)
            .with_location(&manifest);
            emit(&diag, color);
        }
    }

    let json = plan.to_json()?;
    match args.output {
        Some(path) => {
            write_string(&path, &json)?;
            println!("Wrote plan for {} targets to {}", plan.targets.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
