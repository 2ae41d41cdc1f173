/*!
# Preprocessor

The build-time half of the observer: decides how each file is treated and
rewrites it accordingly.

- Stdlib packages with an AST configuration get logging prologs (and
  correlation calls) injected in place ([`stdlib`]).
- User code, dependencies, and allow-listed "safe" stdlib packages get
  qualified calls rebound to wrapper packages ([`wrapper`]); user and
  dependency results are written through the shadow tree ([`shadow`]) so
  originals stay pristine.
- Everything else is left untouched.

[`instrument_package_files`] is the entry point the patched toolchain calls
from its package loader: it processes a package's files and hands back the
directory the loader should read instead.
*/

pub mod prolog;
pub mod registry;
pub mod shadow;
pub mod stdlib;
pub mod wrapper;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::warn;

pub use registry::{LoggerKind, Registry};
pub use shadow::{module_type, ShadowTree, SHADOW_TREE_PREFIX};
pub use stdlib::{is_instrumented, process_stdlib_file, INSTRUMENTATION_MARKER};
pub use wrapper::INSTRUMENTED_SUFFIX;

use crate::gosrc::ParseError;

pub const ENV_INSTRUMENT_UNSAFE: &str = "GO_INSTRUMENT_UNSAFE";
pub const ENV_INSTRUMENT_REFLECT: &str = "GO_INSTRUMENT_REFLECT";
pub const ENV_INSTRUMENT_CRYPTO: &str = "GO_INSTRUMENT_CRYPTO";

/// Errors surfaced by the preprocessor. Parse and post-validation failures
/// carry the offending path; batch operations may skip a failing file and
/// continue.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("transformed code for {} is not valid Go: {source}", .path.display())]
    PostValidation {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PreprocessError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Preprocessing configuration: the feature gates consulted at build time
/// plus the registry that drives treatment decisions.
#[derive(Debug, Clone)]
pub struct Config {
    pub instrument_unsafe: bool,
    pub instrument_reflect: bool,
    pub instrument_crypto: bool,
    pub registry: Registry,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            instrument_unsafe: env::var(ENV_INSTRUMENT_UNSAFE).as_deref() == Ok("true"),
            instrument_reflect: env::var(ENV_INSTRUMENT_REFLECT).as_deref() == Ok("true"),
            instrument_crypto: env::var(ENV_INSTRUMENT_CRYPTO).as_deref() == Ok("true"),
            registry: Registry::standard(),
        }
    }

    pub fn should_instrument(&self) -> bool {
        self.instrument_unsafe || self.instrument_reflect || self.instrument_crypto
    }
}

/// The process-wide shadow tree. Created lazily; torn down only by tests.
pub fn shadow_tree() -> &'static ShadowTree {
    static SHADOW: OnceLock<ShadowTree> = OnceLock::new();
    SHADOW.get_or_init(ShadowTree::new)
}

/// Wrapper-rewrite one file, returning the (possibly rewritten) bytes and
/// whether anything changed.
pub fn process_file(path: &Path, config: &Config) -> Result<(Vec<u8>, bool), PreprocessError> {
    let src = fs::read_to_string(path).map_err(|e| PreprocessError::io(path, e))?;
    match wrapper::rewrite_source(path, &src, &config.registry)? {
        Some(rewritten) => Ok((rewritten.into_bytes(), true)),
        None => Ok((src.into_bytes(), false)),
    }
}

/// Wrapper-rewrite a file in place (safe-stdlib treatment).
pub fn process_file_in_place(path: &Path, config: &Config) -> Result<(), PreprocessError> {
    let path_str = path.to_string_lossy();
    if !config.should_instrument() || !config.registry.should_instrument(&path_str) {
        return Ok(());
    }

    let (content, modified) = process_file(path, config)?;
    if modified {
        fs::write(path, content).map_err(|e| PreprocessError::io(path, e))?;
    }
    Ok(())
}

/// Route one file through its treatment and return the path the toolchain
/// should compile: the original for in-place or untouched files, the shadow
/// copy for rewritten user and dependency code.
pub fn process_file_to_temp(path: &Path, config: &Config) -> Result<PathBuf, PreprocessError> {
    let path_str = path.to_string_lossy().into_owned();
    if !config.should_instrument() || !config.registry.should_instrument(&path_str) {
        return Ok(path.to_path_buf());
    }

    let registry = &config.registry;

    if registry.is_stdlib(&path_str) && !registry.is_stdlib_safe(&path_str) {
        // AST-configured stdlib is injected in place; other stdlib files
        // only reach here when should_instrument let them through, which
        // implies an AST config for their package.
        if let Some(content) = stdlib::process_stdlib_file(path, registry)? {
            fs::write(path, content).map_err(|e| PreprocessError::io(path, e))?;
        }
        return Ok(path.to_path_buf());
    }

    let (content, modified) = process_file(path, config)?;
    if !modified {
        return Ok(path.to_path_buf());
    }

    if registry.is_stdlib_safe(&path_str) {
        fs::write(path, content).map_err(|e| PreprocessError::io(path, e))?;
        return Ok(path.to_path_buf());
    }

    let temp_path = shadow_tree().instrumented_path(path)?;
    fs::write(&temp_path, content).map_err(|e| PreprocessError::io(&temp_path, e))?;
    Ok(temp_path)
}

/// Loader-facing entry point. Processes every file of a package; when any
/// file was rewritten, assembles a complete staging directory (rewritten
/// files plus verbatim copies of the rest) and returns it in place of the
/// original package directory. Per-file failures skip the file and
/// continue; this path must never break a build.
pub fn instrument_package_files(go_files: &[String], pkg_dir: &Path) -> (Vec<String>, PathBuf) {
    let config = Config::from_env();
    if !config.should_instrument() {
        return (go_files.to_vec(), pkg_dir.to_path_buf());
    }

    let mut instrumented_dir: Option<PathBuf> = None;

    for file in go_files {
        let full_path = pkg_dir.join(file);
        let temp_path = match process_file_to_temp(&full_path, &config) {
            Ok(path) => path,
            Err(err) => {
                warn!(file = %full_path.display(), error = %err, "skipping file");
                continue;
            }
        };

        if temp_path == full_path {
            continue;
        }

        if instrumented_dir.is_none() {
            let module = module_type(&full_path.to_string_lossy(), &config.registry);
            let Ok(module_dir) = shadow_tree().module_type_dir(module) else {
                continue;
            };
            let dir = match pkg_dir.file_name() {
                Some(base) => module_dir.join(base),
                None => module_dir,
            };
            if fs::create_dir_all(&dir).is_err() {
                continue;
            }
            instrumented_dir = Some(dir);
        }

        let dir = instrumented_dir.as_ref().expect("just initialized");
        let target = dir.join(file);
        match fs::read(&temp_path) {
            Ok(data) => {
                let _ = fs::write(&target, data);
            }
            Err(_) => continue,
        }
    }

    let Some(dir) = instrumented_dir else {
        return (go_files.to_vec(), pkg_dir.to_path_buf());
    };

    // Fill in the untouched siblings so the staging dir is a complete
    // package.
    for file in go_files {
        let target = dir.join(file);
        if !target.exists() {
            if let Ok(data) = fs::read(pkg_dir.join(file)) {
                let _ = fs::write(&target, data);
            }
        }
    }

    (go_files.to_vec(), dir)
}
