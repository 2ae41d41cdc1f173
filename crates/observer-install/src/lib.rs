//! # Observer Install
//!
//! Library half of the installer: the per-version config store and the
//! patcher that applies it to an unpacked Go toolchain source tree. The
//! `install-instrumentation` binary is a thin CLI over these.

#![warn(clippy::all)]

pub mod inject;
pub mod versions;

pub use inject::{
    add_preprocessor_import, apply_config, apply_patch, inject_code, instrument_toolchain,
    InstallError, PREPROCESSOR_IMPORT_PATH,
};
pub use versions::{list_supported_versions, supported_versions, version_config, VersionError};
