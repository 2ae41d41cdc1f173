//! In-place AST instrumentation of stdlib sources.
//!
//! Selected functions and methods get a logging prolog prepended to their
//! body; correlation-recording accessors additionally get a
//! `RecordMethodByName` call inserted immediately before each return whose
//! first expression is a matching method call. Existing code is never
//! altered, only prepended to, and a marker line makes the file
//! self-identifying so a second run is a no-op.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::gosrc::{parse_file, EditSet, FuncBody, FuncDecl, ReturnCall};

use super::prolog::{record_correlation_stmt, LogCallBuilder, CORRELATION_LOOKUP_KEY};
use super::registry::{
    stdlib_root_package, Registry, StdlibAstInstrumentation, StdlibMethodInstrumentation,
};
use super::PreprocessError;

/// First line of every AST-transformed stdlib file.
pub const INSTRUMENTATION_MARKER: &str = "// INSTRUMENTED BY GO-RUNTIME-OBSERVER";

/// Instrument a stdlib file in AST mode. Returns the rewritten bytes, or
/// `None` when the file is already instrumented, has no AST configuration,
/// or contains nothing to instrument.
pub fn process_stdlib_file(
    path: &Path,
    registry: &Registry,
) -> Result<Option<Vec<u8>>, PreprocessError> {
    let path_str = path.to_string_lossy();
    let Some(package_name) = stdlib_root_package(&path_str) else {
        return Ok(None);
    };
    let Some(config) = registry.stdlib_ast_instrumentation(package_name) else {
        return Ok(None);
    };
    if config.functions.is_empty() && config.methods.is_empty() {
        return Ok(None);
    }

    let content = fs::read(path).map_err(|source| PreprocessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if is_instrumented(&content) {
        return Ok(None);
    }
    let content = String::from_utf8(content).map_err(|source| PreprocessError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
    })?;

    instrument_source(path, &content, config)
}

/// The pure half of [`process_stdlib_file`], operating on source text.
pub fn instrument_source(
    path: &Path,
    src: &str,
    config: &StdlibAstInstrumentation,
) -> Result<Option<Vec<u8>>, PreprocessError> {
    if src.contains(INSTRUMENTATION_MARKER) {
        return Ok(None);
    }

    let file = parse_file(src).map_err(|source| PreprocessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut edits = EditSet::new();
    let mut modified = false;

    for func in &file.funcs {
        let Some(body) = &func.body else { continue };

        match &func.receiver {
            None => {
                if config.functions.iter().any(|f| *f == func.name) {
                    inject_log_prolog(&mut edits, config, func, body, false);
                    modified = true;
                }
            }
            Some(receiver) => {
                for group in &config.methods {
                    if group.receiver_type != receiver.type_name {
                        continue;
                    }
                    if !group.method_names.iter().any(|m| *m == func.name) {
                        continue;
                    }

                    let lookup = group
                        .correlation_lookup_methods
                        .iter()
                        .any(|m| *m == func.name);
                    inject_log_prolog(&mut edits, config, func, body, lookup);

                    if group
                        .correlation_recording_methods
                        .iter()
                        .any(|m| *m == func.name)
                    {
                        inject_correlation_recording(src, &mut edits, config, func, body, group);
                    }

                    modified = true;
                }
            }
        }
    }

    if !modified {
        return Ok(None);
    }

    if !file.has_import(config.logger.import_path()) {
        let (offset, text) = file.import_insertion(None, config.logger.import_path());
        edits.insert(offset, text);
    }

    let rewritten = edits.apply(src).map_err(|source| PreprocessError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), package = %config.package_name, "instrumented stdlib file");

    let mut out = String::with_capacity(rewritten.len() + INSTRUMENTATION_MARKER.len() + 1);
    out.push_str(INSTRUMENTATION_MARKER);
    out.push('\n');
    out.push_str(&rewritten);
    Ok(Some(out.into_bytes()))
}

fn inject_log_prolog(
    edits: &mut EditSet,
    config: &StdlibAstInstrumentation,
    func: &FuncDecl,
    body: &FuncBody,
    lookup: bool,
) {
    let receiver_type = func
        .receiver
        .as_ref()
        .map(|r| r.type_name.as_str())
        .unwrap_or("");

    let mut builder = LogCallBuilder::new(&config.package_name, config.logger)
        .operation(&func.name, receiver_type);

    if let Some(receiver) = &func.receiver {
        if let Some(name) = &receiver.name {
            builder = builder.param(name, &receiver.type_desc);
        }
    }
    for param in &func.params {
        builder = builder.param(&param.name, &param.type_desc);
    }
    if lookup {
        builder = builder.literal(CORRELATION_LOOKUP_KEY, "true");
    }

    edits.insert(body.open_brace + 1, format!("\n\t{}", builder.build()));
}

fn inject_correlation_recording(
    src: &str,
    edits: &mut EditSet,
    config: &StdlibAstInstrumentation,
    func: &FuncDecl,
    body: &FuncBody,
    group: &StdlibMethodInstrumentation,
) {
    let Some(receiver_name) = func.receiver.as_ref().and_then(|r| r.name.as_deref()) else {
        return;
    };
    let Some(extractor) = group.method_identifier_extractors.get(&func.name) else {
        return;
    };
    let return_methods = group
        .return_expression_methods
        .get(&func.name)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for site in &body.returns {
        let Some(expr) = &site.expr else { continue };

        let identifier = match &expr.call {
            Some(call) => {
                let matches = if return_methods.is_empty() {
                    call.method == func.name
                } else {
                    return_methods.iter().any(|m| *m == call.method) || call.method == func.name
                };
                if !matches {
                    continue;
                }
                resolve_extractor(src, func, Some(call), extractor)
            }
            // A direct (non-call) return only qualifies when the method is
            // its own return marker; the extractor then has no call to
            // read from, so only `param:` specs can resolve.
            None if return_methods.is_empty() => resolve_extractor(src, func, None, extractor),
            None => continue,
        };

        // Extractor resolved to nothing: leave the return alone rather
        // than guess.
        let Some(identifier) = identifier else { continue };

        let method_value = &src[expr.span.start..expr.span.end];
        let stmt = record_correlation_stmt(config.logger, method_value, &identifier, receiver_name);
        insert_before_return(src, edits, site.return_offset, &stmt);
    }
}

fn resolve_extractor(
    src: &str,
    func: &FuncDecl,
    call: Option<&ReturnCall>,
    spec: &str,
) -> Option<String> {
    if let Some(param_name) = spec.strip_prefix("param:") {
        return func
            .params
            .iter()
            .find(|p| p.name == param_name)
            .map(|p| p.name.clone());
    }
    if let Some(index_text) = spec.strip_prefix("call:") {
        let call = call?;
        let index: usize = index_text
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);
        return call
            .args
            .get(index)
            .map(|span| src[span.start..span.end].to_string());
    }
    None
}

fn insert_before_return(src: &str, edits: &mut EditSet, return_offset: usize, stmt: &str) {
    let line_start = src[..return_offset]
        .rfind('\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    let prefix = &src[line_start..return_offset];

    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        edits.insert(return_offset, format!("{stmt}\n{prefix}"));
    } else {
        // `return` shares its line with other code; fall back to a
        // same-line statement.
        edits.insert(return_offset, format!("{stmt}; "));
    }
}

/// Whether a file's byte contents already carry the marker.
pub fn is_instrumented(content: &[u8]) -> bool {
    content
        .windows(INSTRUMENTATION_MARKER.len())
        .any(|w| w == INSTRUMENTATION_MARKER.as_bytes())
}
