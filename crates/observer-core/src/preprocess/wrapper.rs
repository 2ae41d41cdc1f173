//! Wrapper rewriting of user, dependency, and safe-stdlib files.
//!
//! Qualified calls to instrumented functions are rebound to the wrapper
//! package under a `<pkg>_instrumented` alias. The original import is
//! removed only when every remaining use of the package was rebound;
//! mixed usage (`unsafe.Add` rewritten, `unsafe.Pointer` kept) leaves both
//! imports in place. The rendered output is re-parsed and rejected if it
//! does not survive.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::gosrc::{parse_file, EditSet};

use super::registry::Registry;
use super::PreprocessError;

pub const INSTRUMENTED_SUFFIX: &str = "_instrumented";

/// Rewrite one file's source. Returns `None` when nothing matched.
pub fn rewrite_source(
    path: &Path,
    src: &str,
    registry: &Registry,
) -> Result<Option<String>, PreprocessError> {
    let file = parse_file(src).map_err(|source| PreprocessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut edits = EditSet::new();

    // Pass 1: rebind every instrumented `pkg.Fn` selector to its alias.
    let mut needed: BTreeMap<String, String> = BTreeMap::new();
    for selector in &file.selectors {
        if registry.is_instrumented(&selector.pkg, &selector.member) {
            let alias = format!("{}{INSTRUMENTED_SUFFIX}", selector.pkg);
            edits.replace(selector.pkg_span, alias.clone());
            needed.insert(selector.pkg.clone(), alias);
        }
    }

    if needed.is_empty() {
        return Ok(None);
    }

    // Pass 2: import the wrapper package under each alias.
    for (package, alias) in &needed {
        if let Some(wrapper_path) = registry.instrumented_import_path(package) {
            if !file.has_import(wrapper_path) {
                let (offset, text) = file.import_insertion(Some(alias), wrapper_path);
                edits.insert(offset, text);
            }
        }
    }

    // Pass 3: drop the original import when no non-instrumented use of the
    // package remains.
    for package in needed.keys() {
        let still_used = file
            .selectors
            .iter()
            .any(|s| s.pkg == *package && !registry.is_instrumented(&s.pkg, &s.member));
        if still_used {
            continue;
        }
        for decl in &file.imports {
            for spec in &decl.specs {
                if spec.path == *package {
                    edits.delete(spec.line_span);
                }
            }
        }
    }

    let rewritten = edits.apply(src).map_err(|source| PreprocessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    // The rewrite must still be valid Go.
    parse_file(&rewritten).map_err(|source| PreprocessError::PostValidation {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        packages = ?needed.keys().collect::<Vec<_>>(),
        "rebound instrumented calls"
    );

    Ok(Some(rewritten))
}
