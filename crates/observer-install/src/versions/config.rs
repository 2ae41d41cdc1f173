//! Version configuration types: where to inject hooks into the toolchain
//! source and which text patches to apply, per Go minor version, with
//! patch-level line overrides.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct VersionConfig {
    /// Minor version this config covers, e.g. `1.23`.
    pub go: String,
    /// Point release the base line numbers were taken from.
    pub base_version: String,
    pub notes: String,
    pub injections: Vec<InjectionConfig>,
    pub patches: Vec<PatchConfig>,
    /// Patch-level overrides keyed by full version (`1.19.10`). Resolution
    /// picks the largest key at or below the requested version.
    pub overrides: BTreeMap<String, VersionOverride>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionOverride {
    pub injections: Vec<InjectionOverride>,
    /// When non-empty, replaces the base patch list wholesale.
    pub patches: Vec<PatchConfig>,
}

#[derive(Debug, Clone)]
pub struct InjectionOverride {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct PatchConfig {
    pub name: String,
    pub target_file: String,
    pub description: String,
    pub find: String,
    pub replace: String,
}

#[derive(Debug, Clone)]
pub struct InjectionConfig {
    pub name: String,
    pub target_file: String,
    /// 1-based line the generated code is inserted after.
    pub line: usize,
    pub description: String,
    pub instrument: InstrumentCall,
    pub reparse: ReparseCall,
}

#[derive(Debug, Clone)]
pub struct InstrumentCall {
    pub function: String,
    pub args: Vec<String>,
    /// Empty when the call's results are discarded.
    pub result: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReparseCall {
    pub result: Vec<String>,
    pub function: String,
    pub args: Vec<String>,
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The two standard injections into the package loader: one after the
/// `Happy:` label on the dependency resolution path, one after the
/// `ImportDir` call handling command-line files. Only the line numbers and
/// the dependency-path reparse receiver vary across versions.
pub(crate) fn standard_injections(
    dependency_line: usize,
    command_line_line: usize,
    dependency_reparse_fn: &str,
) -> Vec<InjectionConfig> {
    vec![
        InjectionConfig {
            name: "dependency".to_string(),
            target_file: "src/cmd/go/internal/load/pkg.go".to_string(),
            line: dependency_line,
            description: "Injects after Happy: label in dependency resolution path".to_string(),
            instrument: InstrumentCall {
                function: "InstrumentPackageFiles".to_string(),
                args: strings(&["data.p.GoFiles", "data.p.Dir"]),
                result: strings(&["data.p.GoFiles", "data.p.Dir"]),
            },
            reparse: ReparseCall {
                result: strings(&["data.p", "data.err"]),
                function: dependency_reparse_fn.to_string(),
                args: strings(&["data.p.Dir", "buildMode"]),
            },
        },
        InjectionConfig {
            name: "command_line".to_string(),
            target_file: "src/cmd/go/internal/load/pkg.go".to_string(),
            line: command_line_line,
            description: "Injects after ImportDir call in goFilesPackage for command-line files"
                .to_string(),
            instrument: InstrumentCall {
                function: "InstrumentPackageFiles".to_string(),
                args: strings(&["bp.GoFiles", "dir"]),
                result: strings(&["bp.GoFiles", "dir"]),
            },
            reparse: ReparseCall {
                result: strings(&["bp", "err"]),
                function: "ctxt.ImportDir".to_string(),
                args: strings(&["dir", "0"]),
            },
        },
    ]
}

/// The one standard text patch: default `buildvcs` off so builds from the
/// shadow tree do not trip VCS stamping.
pub(crate) fn buildvcs_patch() -> Vec<PatchConfig> {
    vec![PatchConfig {
        name: "buildvcs_default".to_string(),
        target_file: "src/cmd/go/internal/cfg/cfg.go".to_string(),
        description: "Disable VCS stamping by default to support temp directory instrumentation"
            .to_string(),
        find: r#"BuildBuildvcs          = "auto""#.to_string(),
        replace: r#"BuildBuildvcs          = "false""#.to_string(),
    }]
}
