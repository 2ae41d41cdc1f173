//! Applies a resolved version config to an unpacked toolchain tree.
//!
//! Work order matters: line-anchored injections first, processed bottom-up
//! per file so earlier insertions cannot shift later line references; then
//! text patches, which are immune to line shifts; imports last, because
//! they perturb line numbers and nothing line-anchored remains.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use observer_core::gosrc::{parse_file, EditSet, ParseError};
use tracing::info;

use crate::versions::config::{InjectionConfig, PatchConfig, VersionConfig};
use crate::versions::{self, VersionError};

pub const PREPROCESSOR_PKG: &str = "preprocessor";
pub const PREPROCESSOR_IMPORT_PATH: &str = "runtime_observe_instrumentation/preprocessor";

pub const ALLOWED_INSTRUMENT_FUNCTION: &str = "InstrumentPackageFiles";
pub const REQUIRED_INSTRUMENT_ARG_COUNT: usize = 2;
pub const REQUIRED_INSTRUMENT_RESULT_COUNT: usize = 2;
pub const REQUIRED_REPARSE_RESULT_COUNT: usize = 2;

/// The closed set of package-resolution calls an injection may re-invoke.
pub const ALLOWED_REPARSE_FUNCTIONS: &[&str] = &[
    "buildContext.ImportDir",
    "ctxt.ImportDir",
    "cfg.BuildContext.ImportDir",
];

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("failed to inject {name}: {source}")]
    InjectionFailed {
        name: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("line {line} is out of range (file has {total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("invalid injection config: {reason}")]
    InvalidInjection { reason: String },

    #[error("{} is not valid Go: {source}", .path.display())]
    OriginalNotValid {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("generated code in {} is not valid Go: {source}", .path.display())]
    GeneratedNotValid {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("patch {name}: could not find target string in {file}")]
    PatchTargetMissing { name: String, file: String },

    #[error("no import block found in {}", .path.display())]
    MissingImportBlock { path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resolve the config for `go_version` and apply it under `go_source_root`.
pub fn instrument_toolchain(go_source_root: &Path, go_version: &str) -> Result<(), InstallError> {
    let config = versions::version_config(go_version)?;
    apply_config(go_source_root, &config)
}

/// Apply an already-resolved configuration.
pub fn apply_config(go_source_root: &Path, config: &VersionConfig) -> Result<(), InstallError> {
    // Group injections by target file, then work each file bottom-up.
    let mut file_injections: BTreeMap<PathBuf, Vec<&InjectionConfig>> = BTreeMap::new();
    for injection in &config.injections {
        let path = go_source_root.join(&injection.target_file);
        file_injections.entry(path).or_default().push(injection);
    }

    for (path, mut injections) in file_injections.iter().map(|(p, i)| (p.clone(), i.clone())) {
        injections.sort_by(|a, b| b.line.cmp(&a.line));
        for injection in injections {
            inject_code(&path, injection).map_err(|source| InstallError::InjectionFailed {
                name: injection.name.clone(),
                source: Box::new(source),
            })?;
            info!(name = %injection.name, file = %path.display(), line = injection.line, "injected");
        }
    }

    for patch in &config.patches {
        let path = go_source_root.join(&patch.target_file);
        apply_patch(&path, patch)?;
        info!(name = %patch.name, file = %path.display(), "patched");
    }

    for path in file_injections.keys() {
        add_preprocessor_import(path)?;
    }

    Ok(())
}

/// Insert the two generated lines after the injection's anchor line, then
/// prove the file still parses.
pub fn inject_code(path: &Path, injection: &InjectionConfig) -> Result<(), InstallError> {
    let content = fs::read_to_string(path).map_err(|e| InstallError::io(path, e))?;

    parse_file(&content).map_err(|source| InstallError::OriginalNotValid {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines: Vec<&str> = content.split('\n').collect();
    if injection.line < 1 || injection.line > lines.len() {
        return Err(InstallError::LineOutOfRange {
            line: injection.line,
            total: lines.len(),
        });
    }

    let generated = generate_injection_lines(injection)?;
    let mut insert_at = injection.line;
    for line in &generated {
        lines.insert(insert_at, line.as_str());
        insert_at += 1;
    }

    let modified = lines.join("\n");

    parse_file(&modified).map_err(|source| InstallError::GeneratedNotValid {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, modified).map_err(|e| InstallError::io(path, e))?;
    Ok(())
}

fn generate_injection_lines(injection: &InjectionConfig) -> Result<Vec<String>, InstallError> {
    validate_injection_config(injection)?;

    let mut lines = Vec::with_capacity(2);

    let instrument = &injection.instrument;
    if instrument.result.is_empty() {
        lines.push(format!(
            "\t{PREPROCESSOR_PKG}.{}({})",
            instrument.function,
            instrument.args.join(", ")
        ));
    } else {
        lines.push(format!(
            "\t{} = {PREPROCESSOR_PKG}.{}({})",
            instrument.result.join(", "),
            instrument.function,
            instrument.args.join(", ")
        ));
    }

    let reparse = &injection.reparse;
    lines.push(format!(
        "\t{} = {}({})",
        reparse.result.join(", "),
        reparse.function,
        reparse.args.join(", ")
    ));

    Ok(lines)
}

/// Anything that appears in a version config is validated before any text
/// is generated from it.
fn validate_injection_config(injection: &InjectionConfig) -> Result<(), InstallError> {
    let instrument = &injection.instrument;

    if instrument.function != ALLOWED_INSTRUMENT_FUNCTION {
        return Err(InstallError::InvalidInjection {
            reason: format!(
                "instrument function must be {ALLOWED_INSTRUMENT_FUNCTION:?}, got {:?}",
                instrument.function
            ),
        });
    }

    if instrument.args.len() != REQUIRED_INSTRUMENT_ARG_COUNT {
        return Err(InstallError::InvalidInjection {
            reason: format!(
                "instrument function requires exactly {REQUIRED_INSTRUMENT_ARG_COUNT} arguments, got {}",
                instrument.args.len()
            ),
        });
    }

    if !instrument.result.is_empty() && instrument.result.len() != REQUIRED_INSTRUMENT_RESULT_COUNT
    {
        return Err(InstallError::InvalidInjection {
            reason: format!(
                "instrument function must return exactly {REQUIRED_INSTRUMENT_RESULT_COUNT} results or none, got {}",
                instrument.result.len()
            ),
        });
    }

    if injection.reparse.result.len() != REQUIRED_REPARSE_RESULT_COUNT {
        return Err(InstallError::InvalidInjection {
            reason: format!(
                "reparse must assign to exactly {REQUIRED_REPARSE_RESULT_COUNT} results, got {}",
                injection.reparse.result.len()
            ),
        });
    }

    if !ALLOWED_REPARSE_FUNCTIONS.contains(&injection.reparse.function.as_str()) {
        return Err(InstallError::InvalidInjection {
            reason: format!(
                "reparse function must be one of {ALLOWED_REPARSE_FUNCTIONS:?}, got {:?}",
                injection.reparse.function
            ),
        });
    }

    Ok(())
}

/// Replace the first occurrence of `find`. A file already carrying
/// `replace` is fine (re-runs are expected); a file with neither is an
/// error.
pub fn apply_patch(path: &Path, patch: &PatchConfig) -> Result<(), InstallError> {
    let content = fs::read_to_string(path).map_err(|e| InstallError::io(path, e))?;

    if !content.contains(&patch.find) {
        if content.contains(&patch.replace) {
            return Ok(());
        }
        return Err(InstallError::PatchTargetMissing {
            name: patch.name.clone(),
            file: patch.target_file.clone(),
        });
    }

    let modified = content.replacen(&patch.find, &patch.replace, 1);
    fs::write(path, modified).map_err(|e| InstallError::io(path, e))?;
    Ok(())
}

/// Add the preprocessor import to a file touched by an injection. The file
/// must already have an import declaration to extend; the toolchain files
/// we anchor into always do.
pub fn add_preprocessor_import(path: &Path) -> Result<(), InstallError> {
    let content = fs::read_to_string(path).map_err(|e| InstallError::io(path, e))?;

    if content.contains(&format!("\"{PREPROCESSOR_IMPORT_PATH}\"")) {
        return Ok(());
    }

    let file = parse_file(&content).map_err(|source| InstallError::OriginalNotValid {
        path: path.to_path_buf(),
        source,
    })?;

    if file.imports.is_empty() {
        return Err(InstallError::MissingImportBlock {
            path: path.to_path_buf(),
        });
    }

    let (offset, text) = file.import_insertion(None, PREPROCESSOR_IMPORT_PATH);
    let mut edits = EditSet::new();
    edits.insert(offset, text);
    let modified = edits
        .apply(&content)
        .map_err(|source| InstallError::GeneratedNotValid {
            path: path.to_path_buf(),
            source,
        })?;

    fs::write(path, modified).map_err(|e| InstallError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::config::{InstrumentCall, ReparseCall};

    fn sample_injection() -> InjectionConfig {
        InjectionConfig {
            name: "dependency".to_string(),
            target_file: "test/pkg.go".to_string(),
            line: 5,
            description: String::new(),
            instrument: InstrumentCall {
                function: "InstrumentPackageFiles".to_string(),
                args: vec!["data.p.GoFiles".to_string(), "data.p.Dir".to_string()],
                result: vec!["data.p.GoFiles".to_string(), "data.p.Dir".to_string()],
            },
            reparse: ReparseCall {
                result: vec!["data.p".to_string(), "data.err".to_string()],
                function: "buildContext.ImportDir".to_string(),
                args: vec!["data.p.Dir".to_string(), "buildMode".to_string()],
            },
        }
    }

    #[test]
    fn generates_assignment_and_reparse_lines() {
        let lines = generate_injection_lines(&sample_injection()).unwrap();
        assert_eq!(
            lines,
            vec![
                "\tdata.p.GoFiles, data.p.Dir = preprocessor.InstrumentPackageFiles(data.p.GoFiles, data.p.Dir)",
                "\tdata.p, data.err = buildContext.ImportDir(data.p.Dir, buildMode)",
            ]
        );
    }

    #[test]
    fn resultless_instrument_call_has_no_assignment() {
        let mut injection = sample_injection();
        injection.instrument.result.clear();
        let lines = generate_injection_lines(&injection).unwrap();
        assert_eq!(
            lines[0],
            "\tpreprocessor.InstrumentPackageFiles(data.p.GoFiles, data.p.Dir)"
        );
    }

    #[test]
    fn rejects_unknown_instrument_function() {
        let mut injection = sample_injection();
        injection.instrument.function = "DoSomethingElse".to_string();
        assert!(matches!(
            generate_injection_lines(&injection),
            Err(InstallError::InvalidInjection { .. })
        ));
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let mut injection = sample_injection();
        injection.instrument.args.push("extra".to_string());
        assert!(generate_injection_lines(&injection).is_err());
    }

    #[test]
    fn rejects_disallowed_reparse_function() {
        let mut injection = sample_injection();
        injection.reparse.function = "os.Exit".to_string();
        assert!(matches!(
            generate_injection_lines(&injection),
            Err(InstallError::InvalidInjection { .. })
        ));
    }

    #[test]
    fn cfg_build_context_variant_is_allowed() {
        let mut injection = sample_injection();
        injection.reparse.function = "cfg.BuildContext.ImportDir".to_string();
        assert!(generate_injection_lines(&injection).is_ok());
    }

    #[test]
    fn line_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.go");
        std::fs::write(&path, "package load\n").unwrap();

        let mut injection = sample_injection();
        injection.line = 400;
        let err = inject_code(&path, &injection).unwrap_err();
        assert!(matches!(err, InstallError::LineOutOfRange { .. }));
    }

    #[test]
    fn patch_replaces_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.go");
        std::fs::write(
            &path,
            "package cfg\n\nvar (\n\tBuildBuildvcs = \"auto\"\n)\n",
        )
        .unwrap();

        let patch = PatchConfig {
            name: "buildvcs_test".to_string(),
            target_file: "cfg.go".to_string(),
            description: String::new(),
            find: "BuildBuildvcs = \"auto\"".to_string(),
            replace: "BuildBuildvcs = \"false\"".to_string(),
        };

        apply_patch(&path, &patch).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("BuildBuildvcs = \"false\""));
        assert!(!content.contains("BuildBuildvcs = \"auto\""));
    }

    #[test]
    fn patch_is_idempotent_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.go");
        let already = "package cfg\n\nvar (\n\tBuildBuildvcs = \"false\"\n)\n";
        std::fs::write(&path, already).unwrap();

        let patch = PatchConfig {
            name: "buildvcs_test".to_string(),
            target_file: "cfg.go".to_string(),
            description: String::new(),
            find: "BuildBuildvcs = \"auto\"".to_string(),
            replace: "BuildBuildvcs = \"false\"".to_string(),
        };

        apply_patch(&path, &patch).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), already);
    }

    #[test]
    fn patch_with_neither_string_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.go");
        std::fs::write(&path, "package cfg\n\nvar BuildMode = \"default\"\n").unwrap();

        let patch = PatchConfig {
            name: "buildvcs_test".to_string(),
            target_file: "cfg.go".to_string(),
            description: String::new(),
            find: "BuildBuildvcs = \"auto\"".to_string(),
            replace: "BuildBuildvcs = \"false\"".to_string(),
        };

        let err = apply_patch(&path, &patch).unwrap_err();
        assert!(matches!(err, InstallError::PatchTargetMissing { .. }));
    }

    #[test]
    fn import_requires_an_existing_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.go");
        std::fs::write(&path, "package load\n\nfunc f() {}\n").unwrap();

        let err = add_preprocessor_import(&path).unwrap_err();
        assert!(matches!(err, InstallError::MissingImportBlock { .. }));
    }

    #[test]
    fn import_is_added_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.go");
        std::fs::write(
            &path,
            "package load\n\nimport (\n\t\"go/build\"\n)\n\nfunc f() {}\n",
        )
        .unwrap();

        add_preprocessor_import(&path).unwrap();
        add_preprocessor_import(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content
                .matches("\"runtime_observe_instrumentation/preprocessor\"")
                .count(),
            1
        );
        assert!(parse_file(&content).is_ok());
    }
}
