//! `modbuild configure` command

use anyhow::Result;

use crate::cli::ConfigureArgs;
use modbuild::ops::configure::{configure, ConfigureOptions};

use super::{build_dir, project_root, user_config};

pub fn execute(args: ConfigureArgs, verbose: bool) -> Result<()> {
    let root = project_root()?;
    let config = user_config(&root);

    let mut opts = ConfigureOptions::from_config(&root, &config)?;
    opts.build_dir = build_dir(&root, &args.build_dir, &config);

    // Command-line flags only ever switch behavior on.
    opts.variant.warnings |= args.enable_warnings;
    opts.variant.debug |= args.enable_debugging;
    opts.variant.verbose |= verbose;
    opts.variant.enable64 |= args.enable_64bit;
    opts.variant.enable32 |= args.enable_32bit;
    opts.doxygen |= args.enable_doxygen;
    opts.libs_only |= args.libs_only;
    opts.shared |= args.shared;
    opts.unittests |= args.unittests;
    if args.disable_symlinks {
        opts.symlinks = false;
    }

    if let Some(optz) = args.with_optz {
        opts.variant.optz = optz.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(crt) = args.with_crt {
        opts.crt = crt.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(prefix) = args.prefix {
        opts.prefix = prefix;
    }
    if args.platform.is_some() {
        opts.platform = args.platform;
    }
    opts.cflags = args.with_cflags.or(opts.cflags);
    opts.cxxflags = args.with_cxxflags.or(opts.cxxflags);
    opts.linkflags = args.with_linkflags.or(opts.linkflags);
    opts.defs = args.with_defs.or(opts.defs);

    let configuration = configure(&opts)?;

    println!(
        "Configured {} ({} {})",
        configuration.variant.name,
        configuration.compiler.family,
        configuration.compiler.cxx.display()
    );
    println!("  build directory: {}", configuration.build_dir.display());
    println!("  install prefix:  {}", configuration.prefix.display());
    Ok(())
}
