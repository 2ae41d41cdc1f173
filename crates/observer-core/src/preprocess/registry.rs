//! Path classification and the instrumentation registry.
//!
//! The registry is immutable after construction. It answers two families of
//! questions: how a file path classifies (stdlib / safe-stdlib / user /
//! dependency / excluded) and which symbols receive which treatment
//! (wrapper rebinding vs. in-place AST prologs).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const STDLIB_SRC_PATTERN: &str = "/src/";
pub const STDLIB_PKG_TOOL_PATTERN: &str = "go/pkg/tool";
pub const INSTRUMENTATION_PATTERN: &str = "runtime_observe_instrumentation";
pub const VENDOR_DIR_PATTERN: &str = "/vendor/";
pub const PKG_MOD_DIR_PATTERN: &str = "/pkg/mod/";

pub const DEPENDENCY_DOMAIN_PATTERNS: &[&str] = &[
    "github.com/",
    "gitlab.com/",
    "bitbucket.org/",
    "golang.org/x/",
    "google.golang.org/",
    "gopkg.in/",
    "go.uber.org/",
    "k8s.io/",
    "sigs.k8s.io/",
    "cloud.google.com/",
    "gocloud.dev/",
];

const STDLIB_PATH_PATTERNS: &[&str] = &[STDLIB_SRC_PATTERN, STDLIB_PKG_TOOL_PATTERN];
const DEPENDENCY_DIR_PATTERNS: &[&str] = &[VENDOR_DIR_PATTERN, PKG_MOD_DIR_PATTERN];

/// Which runtime logging package the generated prolog calls route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerKind {
    Instrument,
    Format,
}

impl LoggerKind {
    pub fn package_name(&self) -> &'static str {
        match self {
            LoggerKind::Instrument => "instrumentlog",
            LoggerKind::Format => "formatlog",
        }
    }

    pub fn import_path(&self) -> &'static str {
        match self {
            LoggerKind::Instrument => "runtime_observe_instrumentation/instrumentlog",
            LoggerKind::Format => "runtime_observe_instrumentation/formatlog",
        }
    }
}

/// A wrapper package for instrumented stdlib functions: where rebound calls
/// import from, and which functions are rebound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentedPackage {
    pub pkg: String,
    pub functions: Vec<String>,
}

/// How to instrument the methods of one receiver type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdlibMethodInstrumentation {
    /// Type name of the method receiver, e.g. `Value`.
    pub receiver_type: String,

    /// Methods that get a logging prolog.
    pub method_names: Vec<String>,

    /// Methods whose returned value is later consumed through the dynamic
    /// call API; these record a correlation before matching returns.
    pub correlation_recording_methods: Vec<String>,

    /// Per recording method, how to obtain the method identifier:
    /// `param:<name>` reads the named function parameter, `call:<index>`
    /// reads an argument of the matched return-call expression.
    pub method_identifier_extractors: HashMap<String, String>,

    /// Per recording method, which callee names to match inside return
    /// expressions. An empty list means match the method's own name.
    pub return_expression_methods: HashMap<String, Vec<String>>,

    /// Methods that consume a previously recorded correlation.
    pub correlation_lookup_methods: Vec<String>,
}

/// AST-level instrumentation config for one stdlib package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdlibAstInstrumentation {
    pub package_name: String,
    pub functions: Vec<String>,
    pub methods: Vec<StdlibMethodInstrumentation>,
    pub logger: LoggerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub instrumentation: HashMap<String, InstrumentedPackage>,
    #[serde(default)]
    pub safe_stdlib_packages: Vec<String>,
    #[serde(default)]
    pub excluded_packages: Vec<String>,
    #[serde(default)]
    pub stdlib_ast: HashMap<String, StdlibAstInstrumentation>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// The shipped configuration: `unsafe` pointer arithmetic rebinds to
    /// the wrapper package, `encoding/json` is safe to wrapper-rewrite in
    /// place, and `reflect` gets AST prologs with lookup/record correlation
    /// across the `MethodByName`/`Method` → `Call`/`CallSlice` gap.
    pub fn standard() -> Self {
        let mut instrumentation = HashMap::new();
        instrumentation.insert(
            "unsafe".to_string(),
            InstrumentedPackage {
                pkg: "runtime_observe_instrumentation/unsafe".to_string(),
                functions: vec![
                    "Add".to_string(),
                    "Slice".to_string(),
                    "SliceData".to_string(),
                    "String".to_string(),
                    "StringData".to_string(),
                ],
            },
        );

        let mut extractors = HashMap::new();
        extractors.insert("MethodByName".to_string(), "param:name".to_string());
        extractors.insert("Method".to_string(), "call:0".to_string());

        // MethodByName internally returns v.Method(index); Method returns
        // itself or a direct Value, so its entry stays empty and falls back
        // to matching the method's own name.
        let mut return_methods = HashMap::new();
        return_methods.insert("MethodByName".to_string(), vec!["Method".to_string()]);
        return_methods.insert("Method".to_string(), Vec::new());

        let mut stdlib_ast = HashMap::new();
        stdlib_ast.insert(
            "reflect".to_string(),
            StdlibAstInstrumentation {
                package_name: "reflect".to_string(),
                functions: vec![
                    "ValueOf".to_string(),
                    "TypeOf".to_string(),
                    "New".to_string(),
                    "NewAt".to_string(),
                    "MakeFunc".to_string(),
                    "MakeMap".to_string(),
                    "MakeMapWithSize".to_string(),
                    "MakeSlice".to_string(),
                    "MakeChan".to_string(),
                ],
                methods: vec![StdlibMethodInstrumentation {
                    receiver_type: "Value".to_string(),
                    method_names: vec![
                        "Call".to_string(),
                        "CallSlice".to_string(),
                        "Method".to_string(),
                        "MethodByName".to_string(),
                        "Set".to_string(),
                        "SetInt".to_string(),
                        "SetString".to_string(),
                        "SetFloat".to_string(),
                        "SetBool".to_string(),
                    ],
                    correlation_recording_methods: vec![
                        "MethodByName".to_string(),
                        "Method".to_string(),
                    ],
                    method_identifier_extractors: extractors,
                    return_expression_methods: return_methods,
                    correlation_lookup_methods: vec!["Call".to_string(), "CallSlice".to_string()],
                }],
                logger: LoggerKind::Instrument,
            },
        );

        Self {
            instrumentation,
            safe_stdlib_packages: vec!["encoding/json".to_string()],
            excluded_packages: Vec::new(),
            stdlib_ast,
        }
    }

    /// Load a registry from its JSON representation; omitted sections fall
    /// back to empty.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    pub fn is_instrumented(&self, stdlib_package: &str, function_name: &str) -> bool {
        self.instrumentation
            .get(stdlib_package)
            .is_some_and(|pkg| pkg.functions.iter().any(|f| f == function_name))
    }

    pub fn instrumented_import_path(&self, stdlib_package: &str) -> Option<&str> {
        self.instrumentation
            .get(stdlib_package)
            .map(|pkg| pkg.pkg.as_str())
    }

    pub fn stdlib_ast_instrumentation(&self, package_name: &str) -> Option<&StdlibAstInstrumentation> {
        self.stdlib_ast.get(package_name)
    }

    pub fn is_user_package(&self, file_path: &str) -> bool {
        !self.is_stdlib(file_path) && !self.is_dependency_package(file_path)
    }

    pub fn is_stdlib(&self, file_path: &str) -> bool {
        if STDLIB_PATH_PATTERNS
            .iter()
            .any(|pattern| file_path.contains(pattern))
        {
            return true;
        }

        file_path.contains(INSTRUMENTATION_PATTERN) && !self.is_dependency_package(file_path)
    }

    pub fn is_stdlib_safe(&self, file_path: &str) -> bool {
        if !self.is_stdlib(file_path) {
            return false;
        }

        match package_name_from_path(file_path) {
            Some(package_name) => self
                .safe_stdlib_packages
                .iter()
                .any(|pkg| *pkg == package_name),
            None => false,
        }
    }

    pub fn is_dependency_package(&self, file_path: &str) -> bool {
        DEPENDENCY_DOMAIN_PATTERNS
            .iter()
            .chain(DEPENDENCY_DIR_PATTERNS)
            .any(|pattern| file_path.contains(pattern))
    }

    pub fn is_excluded_package(&self, file_path: &str) -> bool {
        self.excluded_packages
            .iter()
            .any(|excluded| file_path.contains(excluded))
    }

    /// The treatment gate: anything in the instrumentation package itself
    /// or on the exclusion list is skipped; user, dependency, and
    /// safe-stdlib files are rewritten; stdlib files are touched only when
    /// their package has an AST configuration.
    pub fn should_instrument(&self, file_path: &str) -> bool {
        if file_path.contains(INSTRUMENTATION_PATTERN) {
            return false;
        }

        if self.is_excluded_package(file_path) {
            return false;
        }

        if self.is_user_package(file_path) || self.is_dependency_package(file_path) {
            return true;
        }

        if self.is_stdlib_safe(file_path) {
            return true;
        }

        if self.is_stdlib(file_path) {
            if let Some(package_name) = stdlib_root_package(file_path) {
                return self.stdlib_ast.contains_key(package_name);
            }
        }

        false
    }
}

/// Package path relative to `src/`, down to but not including the file, so
/// grouped packages like `encoding/json` classify correctly. A file sitting
/// directly under `src/` yields its stem.
pub fn package_name_from_path(file_path: &str) -> Option<String> {
    let parts: Vec<&str> = file_path.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "src" && i + 1 < parts.len() {
            if i + 2 == parts.len() {
                let file_name = parts[i + 1];
                return Some(
                    file_name
                        .strip_suffix(".go")
                        .unwrap_or(file_name)
                        .to_string(),
                );
            }
            return Some(parts[i + 1..parts.len() - 1].join("/"));
        }
    }
    None
}

/// First path segment after `src/`: the stdlib root package used to look up
/// AST configurations. Dotted segments (module roots like `example.com`)
/// are skipped, and the instrumentation package itself never matches.
pub fn stdlib_root_package(file_path: &str) -> Option<&str> {
    let parts: Vec<&str> = file_path.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "src" && i + 1 < parts.len() {
            let next = parts[i + 1];
            if next == INSTRUMENTATION_PATTERN {
                return None;
            }
            if next.contains('.') {
                continue;
            }
            return Some(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stdlib_paths() {
        let registry = Registry::standard();
        assert!(registry.is_stdlib("/usr/local/go/src/reflect/value.go"));
        assert!(registry.is_stdlib("/opt/go/pkg/tool/compile"));
        assert!(!registry.is_stdlib("/home/user/project/main.go"));
    }

    #[test]
    fn classifies_dependencies() {
        let registry = Registry::standard();
        assert!(registry.is_dependency_package("/go/pkg/mod/github.com/lib/pq/conn.go"));
        assert!(registry.is_dependency_package("/project/vendor/foo/bar.go"));
        assert!(registry.is_dependency_package("/cache/golang.org/x/tools/main.go"));
        assert!(!registry.is_dependency_package("/home/user/project/main.go"));
    }

    #[test]
    fn user_packages_are_neither_stdlib_nor_dependency() {
        let registry = Registry::standard();
        assert!(registry.is_user_package("/home/user/project/main.go"));
        assert!(!registry.is_user_package("/usr/local/go/src/reflect/value.go"));
    }

    #[test]
    fn classification_is_a_partition() {
        let registry = Registry::standard();
        let paths = [
            "/usr/local/go/src/reflect/value.go",
            "/usr/local/go/src/encoding/json/encode.go",
            "/home/user/project/main.go",
            "/go/pkg/mod/github.com/lib/pq/conn.go",
            "/project/vendor/foo/bar.go",
        ];
        for path in paths {
            let stdlib = registry.is_stdlib(path) && !registry.is_dependency_package(path);
            let dependency = registry.is_dependency_package(path);
            let user = registry.is_user_package(path);
            assert_eq!(
                [stdlib, dependency, user].iter().filter(|b| **b).count(),
                1,
                "path {path} must land in exactly one class"
            );
        }
    }

    #[test]
    fn safe_stdlib_uses_full_package_path() {
        let registry = Registry::standard();
        assert!(registry.is_stdlib_safe("/usr/local/go/src/encoding/json/encode.go"));
        assert!(!registry.is_stdlib_safe("/usr/local/go/src/encoding/xml/marshal.go"));
        assert!(!registry.is_stdlib_safe("/usr/local/go/src/reflect/value.go"));
    }

    #[test]
    fn should_instrument_decision_table() {
        let registry = Registry::standard();

        // Instrumentation package itself is never touched.
        assert!(!registry
            .should_instrument("/go/src/runtime_observe_instrumentation/instrumentlog/logger.go"));
        // User and dependency code is wrapper-rewritten.
        assert!(registry.should_instrument("/home/user/project/main.go"));
        assert!(registry.should_instrument("/go/pkg/mod/github.com/lib/pq/conn.go"));
        // Safe stdlib is rewritten, AST-configured stdlib is injected.
        assert!(registry.should_instrument("/usr/local/go/src/encoding/json/encode.go"));
        assert!(registry.should_instrument("/usr/local/go/src/reflect/value.go"));
        // Plain stdlib is left alone.
        assert!(!registry.should_instrument("/usr/local/go/src/os/file.go"));
    }

    #[test]
    fn excluded_packages_are_skipped() {
        let mut registry = Registry::standard();
        registry.excluded_packages.push("project/generated".to_string());
        assert!(!registry.should_instrument("/home/user/project/generated/main.go"));
    }

    #[test]
    fn registry_round_trips_through_json() {
        let registry = Registry::standard();
        let json = serde_json::to_string(&registry).unwrap();
        let loaded = Registry::from_json(&json).unwrap();
        assert!(loaded.is_instrumented("unsafe", "Add"));
        assert_eq!(
            loaded.instrumented_import_path("unsafe"),
            Some("runtime_observe_instrumentation/unsafe")
        );
        assert!(loaded.stdlib_ast_instrumentation("reflect").is_some());
    }

    #[test]
    fn partial_json_configs_default_missing_sections() {
        let loaded =
            Registry::from_json(r#"{"safe_stdlib_packages": ["encoding/json"]}"#).unwrap();
        assert!(loaded.instrumentation.is_empty());
        assert!(loaded.is_stdlib_safe("/go/src/encoding/json/encode.go"));
    }

    #[test]
    fn package_name_extraction() {
        assert_eq!(
            package_name_from_path("/go/src/encoding/json/encode.go").as_deref(),
            Some("encoding/json")
        );
        assert_eq!(
            package_name_from_path("/go/src/reflect/value.go").as_deref(),
            Some("reflect")
        );
        assert_eq!(
            package_name_from_path("/go/src/main.go").as_deref(),
            Some("main")
        );
        assert_eq!(package_name_from_path("/home/user/main.go"), None);
    }

    #[test]
    fn stdlib_root_package_extraction() {
        assert_eq!(
            stdlib_root_package("/go/src/reflect/value.go"),
            Some("reflect")
        );
        assert_eq!(
            stdlib_root_package("/go/src/crypto/sha256/sha256.go"),
            Some("crypto")
        );
        assert_eq!(
            stdlib_root_package("/go/src/runtime_observe_instrumentation/unsafe/unsafe.go"),
            None
        );
        assert_eq!(
            stdlib_root_package("/go/src/example.com/src/pkg/file.go"),
            Some("pkg")
        );
    }
}
