//! Generated configuration headers.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::DefineMap;
use crate::util::fs::write_string;

const GUARD: &str = "__CONFIG_H__";

static UNDEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(#undef[^\n]*)\n").expect("valid regex"));

/// Render an include-guarded header with one `#ifndef/#define` pair per
/// entry, in insertion order, followed by an `#undef` for each of `undefs`.
///
/// Absent entries are written with an empty value.
pub fn render_header(defs: &DefineMap, undefs: &[String]) -> String {
    let mut out = format!("#ifndef {GUARD}\n#define {GUARD}\n\n");

    for (key, value) in defs.iter() {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        out.push_str(&format!("\n#ifndef {key}\n#define {key} {value}\n#endif\n"));
    }

    for undef in undefs {
        out.push_str(&format!("\n#undef {undef}\n"));
    }

    out.push_str(&format!("\n#endif /* {GUARD} */\n"));
    out
}

/// Render and write a header to `path`, creating parent directories.
pub fn write_header(path: &Path, defs: &DefineMap, undefs: &[String]) -> Result<()> {
    write_string(path, &render_header(defs, undefs))
        .with_context(|| format!("failed to write header {}", path.display()))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

/// Turn every `#undef` line of a template into a comment, leaving the rest
/// untouched.
pub fn comment_undefs(code: &str) -> String {
    UNDEF_RE.replace_all(code, "/* $1 */\n").into_owned()
}
