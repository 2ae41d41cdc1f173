//! # Observer Core
//!
//! Core implementation of the Go runtime observer, including:
//! - Go source syntax layer (scanner, reduced parser, splice rewriting)
//! - Preprocessor (stdlib AST injection, wrapper rebinding, path registry)
//! - Shadow tree for rewritten user and dependency files
//! - Runtime components: structured call logger, typed formatters, and the
//!   correlation tracker
//!
//! This crate provides the foundational components used by the installer
//! CLI and linked into the instrumented toolchain's build pipeline.

#![warn(clippy::all)]

pub mod gosrc;
pub mod instrument;
pub mod preprocess;

// Re-export commonly used types
pub use gosrc::{parse_file, EditSet, ParseError, SourceFile};
pub use instrument::{CallArgs, CorrelationEntry, Logger, Tracker, TrackerMetrics};
pub use preprocess::{
    instrument_package_files, process_file, process_file_in_place, process_file_to_temp, Config,
    LoggerKind, PreprocessError, Registry, ShadowTree, INSTRUMENTATION_MARKER,
};

/// Observer version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for observer core components
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("observer_core=info".parse().unwrap()),
        )
        .init();
}
