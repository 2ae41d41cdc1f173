//! Shadow tree for rewritten user and dependency files.
//!
//! One process-local temp root, created lazily, mirrors original absolute
//! paths so rewritten copies never clobber originals. Lookups are cached
//! behind a read/write lock; `cleanup` exists for the test harness only.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::TempDir;

use super::registry::Registry;
use super::PreprocessError;

pub const SHADOW_TREE_PREFIX: &str = "go-runtime-observer-";

#[derive(Default)]
pub struct ShadowTree {
    root: RwLock<Option<TempDir>>,
    path_cache: RwLock<HashMap<PathBuf, PathBuf>>,
}

impl ShadowTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The temp root, creating it on first use.
    pub fn root(&self) -> Result<PathBuf, PreprocessError> {
        if let Some(dir) = self.root.read().as_ref() {
            return Ok(dir.path().to_path_buf());
        }

        let mut guard = self.root.write();
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new()
            .prefix(SHADOW_TREE_PREFIX)
            .tempdir()
            .map_err(|source| PreprocessError::Io {
                path: PathBuf::from("<shadow-root>"),
                source,
            })?;
        let path = dir.path().to_path_buf();
        *guard = Some(dir);
        Ok(path)
    }

    /// Staging directory for one module type (`stdlib`, `dependency`,
    /// `user`), used when assembling a complete instrumented package dir.
    pub fn module_type_dir(&self, module_type: &str) -> Result<PathBuf, PreprocessError> {
        let dir = self.root()?.join(module_type);
        fs::create_dir_all(&dir).map_err(|source| PreprocessError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Shadow location for `original_path`: the absolute original path
    /// mirrored verbatim under the temp root, parent directories created.
    /// Repeated requests hit the cache.
    pub fn instrumented_path(&self, original_path: &Path) -> Result<PathBuf, PreprocessError> {
        if let Some(cached) = self.path_cache.read().get(original_path) {
            return Ok(cached.clone());
        }

        let root = self.root()?;
        let absolute = original_path
            .canonicalize()
            .unwrap_or_else(|_| original_path.to_path_buf());

        let mut shadow = root;
        for component in absolute.components() {
            use std::path::Component;
            match component {
                Component::RootDir | Component::Prefix(_) => {}
                other => shadow.push(other),
            }
        }

        if let Some(parent) = shadow.parent() {
            fs::create_dir_all(parent).map_err(|source| PreprocessError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.path_cache
            .write()
            .insert(original_path.to_path_buf(), shadow.clone());

        Ok(shadow)
    }

    /// Remove the temp root and reset the cache. Test-harness teardown;
    /// never called during normal operation.
    pub fn cleanup(&self) -> Result<(), PreprocessError> {
        self.path_cache.write().clear();
        if let Some(dir) = self.root.write().take() {
            let path = dir.path().to_path_buf();
            dir.close()
                .map_err(|source| PreprocessError::Io { path, source })?;
        }
        Ok(())
    }
}

/// Module type of a file for staging purposes.
pub fn module_type(file_path: &str, registry: &Registry) -> &'static str {
    if registry.is_stdlib(file_path) {
        "stdlib"
    } else if registry.is_dependency_package(file_path) {
        "dependency"
    } else {
        "user"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_absolute_paths_under_root() {
        let tree = ShadowTree::new();
        let original = PathBuf::from("/definitely/not/a/real/dir/main.go");
        let shadow = tree.instrumented_path(&original).unwrap();

        let root = tree.root().unwrap();
        assert!(shadow.starts_with(&root));
        assert!(shadow.ends_with("definitely/not/a/real/dir/main.go"));
        assert!(shadow.parent().unwrap().is_dir());
        tree.cleanup().unwrap();
    }

    #[test]
    fn repeated_requests_are_cached() {
        let tree = ShadowTree::new();
        let original = PathBuf::from("/some/project/pkg/file.go");
        let first = tree.instrumented_path(&original).unwrap();
        let second = tree.instrumented_path(&original).unwrap();
        assert_eq!(first, second);
        tree.cleanup().unwrap();
    }

    #[test]
    fn root_uses_observer_prefix() {
        let tree = ShadowTree::new();
        let root = tree.root().unwrap();
        let name = root.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(SHADOW_TREE_PREFIX));
        tree.cleanup().unwrap();
    }

    #[test]
    fn cleanup_removes_root_and_resets() {
        let tree = ShadowTree::new();
        let root = tree.root().unwrap();
        tree.cleanup().unwrap();
        assert!(!root.exists());

        // A fresh root is created on next use.
        let new_root = tree.root().unwrap();
        assert_ne!(root, new_root);
        tree.cleanup().unwrap();
    }

    #[test]
    fn module_types() {
        let registry = Registry::standard();
        assert_eq!(module_type("/go/src/reflect/value.go", &registry), "stdlib");
        assert_eq!(
            module_type("/go/pkg/mod/github.com/lib/pq/conn.go", &registry),
            "dependency"
        );
        assert_eq!(module_type("/home/me/app/main.go", &registry), "user");
    }
}
