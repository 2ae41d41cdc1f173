use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, Command};

use observer_install::{instrument_toolchain, list_supported_versions, version_config};

fn main() {
    observer_core::init_tracing();

    let matches = Command::new("install-instrumentation")
        .version(observer_core::VERSION)
        .about("Patches an unpacked Go toolchain source tree to weave the observer preprocessor into the package loader")
        .arg(
            Arg::new("go-version")
                .long("go-version")
                .value_name("VERSION")
                .help("Go version to instrument for")
                .default_value("1.23.0"),
        )
        .arg(
            Arg::new("list-versions")
                .long("list-versions")
                .help("List all supported Go versions and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("source-root")
                .value_name("GO_SOURCE_ROOT")
                .help("Path to the unpacked Go source root")
                .index(1),
        )
        .get_matches();

    if matches.get_flag("list-versions") {
        println!("Supported Go versions:");
        for minor in list_supported_versions() {
            if let Ok(config) = version_config(&format!("{minor}.0")) {
                println!("  - {minor} ({})", config.notes);
            }
        }
        process::exit(0);
    }

    let Some(source_root) = matches.get_one::<String>("source-root") else {
        eprintln!("Usage: install-instrumentation [options] <path-to-go-source-root>");
        eprintln!("Run with --help for options");
        process::exit(1);
    };
    let go_version = matches.get_one::<String>("go-version").expect("has default");

    let config = match version_config(go_version) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Supported Go versions:");
            for minor in list_supported_versions() {
                eprintln!("  - {minor}");
            }
            eprintln!();
            eprintln!(
                "To add support for Go {go_version}, add a config module under src/versions/"
            );
            process::exit(1);
        }
    };

    println!("Instrumenting Go {}", config.go);

    if !config.injections.is_empty() {
        println!("Injections ({}):", config.injections.len());
        for injection in &config.injections {
            println!(
                "  - {} -> {}:{}",
                injection.name, injection.target_file, injection.line
            );
        }
    }

    if !config.patches.is_empty() {
        println!("Patches ({}):", config.patches.len());
        for patch in &config.patches {
            println!("  - {} -> {}", patch.name, patch.target_file);
        }
    }

    if let Err(err) = instrument_toolchain(&PathBuf::from(source_root), go_version) {
        eprintln!("Error: {err}");
        process::exit(1);
    }

    println!("Instrumentation complete");
}
