//! `modbuild linkorder` command

use anyhow::Result;

use crate::cli::LinkorderArgs;
use modbuild::builder::{resolve_link_order, LinkOrderError};
use modbuild::core::{Manifest, MANIFEST_NAME};
use modbuild::ops::plan::build_graph;
use modbuild::util::diagnostic::{suggestions, Diagnostic};

use super::{load_configuration, project_root};

pub fn execute(args: LinkorderArgs) -> Result<()> {
    let root = project_root()?;
    let configuration = load_configuration(&root, &args.build_dir)?;
    let manifest = Manifest::load(&root.join(MANIFEST_NAME))?;
    let graph = build_graph(&manifest, &configuration)?;

    let order = match resolve_link_order(&graph, &args.target) {
        Ok(order) => order,
        Err(LinkOrderError::UnknownTarget(name)) => {
            return Err(Diagnostic::error(format!("target `{}` not found", name))
                .with_suggestion(suggestions::TARGET_NOT_FOUND)
                .into())
        }
        Err(e) => return Err(e.into()),
    };

    println!("Link order for '{}':", args.target);
    println!();

    let mut index = 1;
    for lib in &order.static_libs {
        println!("  {}. {} (static)", index, lib);
        index += 1;
    }
    for lib in &order.shared_libs {
        println!("  {}. {} (shared)", index, lib);
        index += 1;
    }
    if let Some(target) = graph.get(&args.target) {
        for lib in &target.link.system_libs {
            println!("  {}. {} (system)", index, lib);
            index += 1;
        }
    }
    if index == 1 {
        println!("  (no link inputs)");
    }

    if !order.unresolved.is_empty() {
        println!();
        println!("Not declared:");
        for name in &order.unresolved {
            println!("  {}", name);
        }
    }
    Ok(())
}
