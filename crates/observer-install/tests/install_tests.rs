//! End-to-end installer tests against a miniature toolchain tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use observer_core::gosrc::parse_file;
use observer_install::versions::config::{
    InjectionConfig, InstrumentCall, PatchConfig, ReparseCall, VersionConfig,
};
use observer_install::{apply_config, PREPROCESSOR_IMPORT_PATH};

const PKG_GO: &str = r#"package load

import (
	"go/build"
)

type Package struct {
	GoFiles []string
	Dir     string
}

type packageData struct {
	p   *Package
	err error
}

type buildContextType struct{}

func (buildContextType) ImportDir(dir string, mode int) (*Package, error) { return nil, nil }

type ctxtType struct{}

func (ctxtType) ImportDir(dir string, mode int) (*Package, error) { return nil, nil }

var buildContext buildContextType
var ctxt ctxtType

func loadPackage() {
	data := packageData{p: nil, err: nil}
	buildMode := 0
	goto Happy

Happy:
	_ = data
	_ = buildMode
	_ = build.Default
}

func goFilesPackage() {
	dir := "."
	bp, err := ctxt.ImportDir(dir, 0)
	pkg := new(Package)
	_ = bp
	_ = err
	_ = pkg
}
"#;

const CFG_GO: &str = r#"package cfg

var (
	BuildBuildvcs          = "auto"
	BuildMode              = "default"
)
"#;

fn line_of(content: &str, needle: &str) -> usize {
    content
        .lines()
        .position(|line| line.contains(needle))
        .map(|idx| idx + 1)
        .expect("needle must exist in fixture")
}

fn write_tree(root: &Path) {
    let load_dir = root.join("src/cmd/go/internal/load");
    let cfg_dir = root.join("src/cmd/go/internal/cfg");
    fs::create_dir_all(&load_dir).unwrap();
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(load_dir.join("pkg.go"), PKG_GO).unwrap();
    fs::write(cfg_dir.join("cfg.go"), CFG_GO).unwrap();
}

fn test_config() -> VersionConfig {
    let dependency_line = line_of(PKG_GO, "Happy:");
    let command_line_line = line_of(PKG_GO, "bp, err := ctxt.ImportDir(dir, 0)");

    VersionConfig {
        go: "test".to_string(),
        base_version: "0.0.0".to_string(),
        notes: "Test config".to_string(),
        injections: vec![
            InjectionConfig {
                name: "dependency".to_string(),
                target_file: "src/cmd/go/internal/load/pkg.go".to_string(),
                line: dependency_line,
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
            },
            InjectionConfig {
                name: "command_line".to_string(),
                target_file: "src/cmd/go/internal/load/pkg.go".to_string(),
                line: command_line_line,
                description: String::new(),
                instrument: InstrumentCall {
                    function: "InstrumentPackageFiles".to_string(),
                    args: vec!["bp.GoFiles".to_string(), "dir".to_string()],
                    result: vec!["bp.GoFiles".to_string(), "dir".to_string()],
                },
                reparse: ReparseCall {
                    result: vec!["bp".to_string(), "err".to_string()],
                    function: "ctxt.ImportDir".to_string(),
                    args: vec!["dir".to_string(), "0".to_string()],
                },
            },
        ],
        patches: vec![PatchConfig {
            name: "buildvcs_default".to_string(),
            target_file: "src/cmd/go/internal/cfg/cfg.go".to_string(),
            description: String::new(),
            find: r#"BuildBuildvcs          = "auto""#.to_string(),
            replace: r#"BuildBuildvcs          = "false""#.to_string(),
        }],
        overrides: BTreeMap::new(),
    }
}

#[test]
fn two_injection_install() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    write_tree(root.path());

    apply_config(root.path(), &test_config())?;

    let pkg = fs::read_to_string(root.path().join("src/cmd/go/internal/load/pkg.go"))?;

    // The preprocessor import was appended to the existing group.
    assert!(pkg.contains(&format!("\"{PREPROCESSOR_IMPORT_PATH}\"")));

    // Dependency path: prolog + reparse directly after the Happy: label.
    assert!(pkg.contains(
        "Happy:\n\tdata.p.GoFiles, data.p.Dir = preprocessor.InstrumentPackageFiles(data.p.GoFiles, data.p.Dir)\n\tdata.p, data.err = buildContext.ImportDir(data.p.Dir, buildMode)\n"
    ));

    // Command-line path: the bp/err pair after the ImportDir call.
    assert!(pkg.contains(
        "bp, err := ctxt.ImportDir(dir, 0)\n\tbp.GoFiles, dir = preprocessor.InstrumentPackageFiles(bp.GoFiles, dir)\n\tbp, err = ctxt.ImportDir(dir, 0)\n"
    ));

    // The result must still parse.
    parse_file(&pkg)?;

    let cfg = fs::read_to_string(root.path().join("src/cmd/go/internal/cfg/cfg.go"))?;
    assert!(cfg.contains(r#"BuildBuildvcs          = "false""#));
    assert!(!cfg.contains(r#"BuildBuildvcs          = "auto""#));
    Ok(())
}

#[test]
fn reinstall_keeps_a_single_import_and_idempotent_patch() {
    let root = tempfile::tempdir().unwrap();
    write_tree(root.path());
    let config = test_config();

    apply_config(root.path(), &config).unwrap();

    // Patch the config lines so the second run anchors cleanly on the
    // already-modified file; imports and patches must not double up.
    let pkg = fs::read_to_string(root.path().join("src/cmd/go/internal/load/pkg.go")).unwrap();
    let mut second = config.clone();
    second.injections[0].line = line_of(&pkg, "Happy:");
    second.injections[1].line = line_of(&pkg, "bp, err := ctxt.ImportDir(dir, 0)");
    apply_config(root.path(), &second).unwrap();

    let pkg = fs::read_to_string(root.path().join("src/cmd/go/internal/load/pkg.go")).unwrap();
    assert_eq!(
        pkg.matches(&format!("\"{PREPROCESSOR_IMPORT_PATH}\"")).count(),
        1
    );

    let cfg = fs::read_to_string(root.path().join("src/cmd/go/internal/cfg/cfg.go")).unwrap();
    assert!(cfg.contains(r#"BuildBuildvcs          = "false""#));
}

#[test]
fn missing_patch_target_aborts() {
    let root = tempfile::tempdir().unwrap();
    write_tree(root.path());

    let mut config = test_config();
    config.patches[0].find = "NoSuchString".to_string();
    config.patches[0].replace = "AlsoMissing".to_string();

    let err = apply_config(root.path(), &config).unwrap_err();
    assert!(err.to_string().contains("could not find target string"));
}

#[test]
fn injection_line_out_of_range_names_the_injection() {
    let root = tempfile::tempdir().unwrap();
    write_tree(root.path());

    let mut config = test_config();
    config.injections[0].line = 10_000;

    let err = apply_config(root.path(), &config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("dependency"));
    assert!(message.contains("out of range"));
}
