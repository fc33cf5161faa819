//! `modbuild header` command

use anyhow::{Context, Result};

use crate::cli::HeaderArgs;
use modbuild::core::{DefineMap, DefineValue};
use modbuild::ops::header::{comment_undefs, write_header};
use modbuild::util::fs::write_string;

use super::{load_configuration, project_root};

pub fn execute(args: HeaderArgs) -> Result<()> {
    if let Some(template) = &args.template {
        let code = std::fs::read_to_string(template)
            .with_context(|| format!("failed to read template {}", template.display()))?;
        write_string(&args.output, &comment_undefs(&code))?;
        println!("Wrote {}", args.output.display());
        return Ok(());
    }

    let mut defs = if args.no_probes {
        DefineMap::new()
    } else {
        let root = project_root()?;
        load_configuration(&root, &args.build_dir)?.variant.env.defines
    };

    for define in &args.defines {
        match define.split_once('=') {
            Some((key, value)) => defs.define(key, DefineValue::parse(value)),
            None => defs.define(define.as_str(), 1),
        }
    }

    write_header(&args.output, &defs, &args.undefs)?;
    println!("Wrote {}", args.output.display());
    Ok(())
}
