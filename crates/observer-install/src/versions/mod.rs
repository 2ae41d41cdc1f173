/*!
# Version config store

Maps Go minor versions to their instrumentation configuration. Each
version's base config lives in its own `v1_XX` module; point releases that
shifted the anchored line numbers are handled with per-version overrides
inside the base config.

To add a new Go version: create `v1_XX.rs` with a `config()` function,
register it in [`supported_versions`], and verify the injection lines
against that release's `src/cmd/go/internal/load/pkg.go`.
*/

pub mod config;
mod v1_19;
mod v1_20;
mod v1_21;
mod v1_22;
mod v1_23;
mod v1_24;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use config::VersionConfig;

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("invalid version format: {version} (expected at least major.minor)")]
    InvalidFormat { version: String },

    #[error("no configuration found for Go version {version}{}", closest_note(.closest))]
    NotSupported {
        version: String,
        closest: Option<String>,
    },
}

fn closest_note(closest: &Option<String>) -> String {
    match closest {
        Some(minor) => format!(" (closest lower supported version: {minor})"),
        None => String::new(),
    }
}

/// Base configurations keyed by minor version.
pub fn supported_versions() -> &'static BTreeMap<String, VersionConfig> {
    static VERSIONS: OnceLock<BTreeMap<String, VersionConfig>> = OnceLock::new();
    VERSIONS.get_or_init(|| {
        let mut versions = BTreeMap::new();
        versions.insert("1.19".to_string(), v1_19::config());
        versions.insert("1.20".to_string(), v1_20::config());
        versions.insert("1.21".to_string(), v1_21::config());
        versions.insert("1.22".to_string(), v1_22::config());
        versions.insert("1.23".to_string(), v1_23::config());
        versions.insert("1.24".to_string(), v1_24::config());
        versions
    })
}

pub fn list_supported_versions() -> Vec<String> {
    supported_versions().keys().cloned().collect()
}

/// Resolve the effective configuration for a full version string: the
/// minor's base config with the best-matching override applied.
pub fn version_config(version: &str) -> Result<VersionConfig, VersionError> {
    let minor = minor_version(version)?;

    let Some(base) = supported_versions().get(&minor) else {
        return Err(VersionError::NotSupported {
            version: version.to_string(),
            closest: closest_lower_minor(&minor),
        });
    };

    Ok(apply_overrides(base, version))
}

fn minor_version(version: &str) -> Result<String, VersionError> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 {
        return Err(VersionError::InvalidFormat {
            version: version.to_string(),
        });
    }
    Ok(format!("{}.{}", parts[0], parts[1]))
}

/// Largest supported minor strictly below the requested one, if any.
fn closest_lower_minor(minor: &str) -> Option<String> {
    supported_versions()
        .keys()
        .filter(|candidate| compare_versions(candidate, minor) == Ordering::Less)
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
}

/// Semantic tuple comparison over up to three `major.minor.patch`
/// components; missing components compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts_a: Vec<&str> = a.split('.').collect();
    let parts_b: Vec<&str> = b.split('.').collect();

    for i in 0..3 {
        let num_a: u64 = parts_a.get(i).and_then(|p| p.parse().ok()).unwrap_or(0);
        let num_b: u64 = parts_b.get(i).and_then(|p| p.parse().ok()).unwrap_or(0);
        match num_a.cmp(&num_b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Deep-copy the base and apply the override with the largest key at or
/// below the target version: matching injections get their line replaced,
/// and a non-empty override patch list replaces the base list wholesale.
fn apply_overrides(base: &VersionConfig, target_version: &str) -> VersionConfig {
    let mut resolved = base.clone();

    if base.overrides.is_empty() {
        return resolved;
    }

    // Overrides are keyed by full versions; a bare minor request gets the
    // base config untouched.
    if target_version.split('.').count() < 3 {
        return resolved;
    }

    let best = base
        .overrides
        .iter()
        .filter(|(key, _)| compare_versions(key, target_version) != Ordering::Greater)
        .max_by(|(a, _), (b, _)| compare_versions(a, b));

    let Some((_, the_override)) = best else {
        return resolved;
    };

    for injection_override in &the_override.injections {
        for injection in &mut resolved.injections {
            if injection.name == injection_override.name {
                injection.line = injection_override.line;
                break;
            }
        }
    }

    if !the_override.patches.is_empty() {
        resolved.patches = the_override.patches.clone();
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_config_for_exact_base_version() {
        let config = version_config("1.19.0").unwrap();
        assert_eq!(config.go, "1.19");
        let dependency = config
            .injections
            .iter()
            .find(|i| i.name == "dependency")
            .unwrap();
        assert_eq!(dependency.line, 897);
    }

    #[test]
    fn override_applies_at_and_above_its_key() {
        // 1.19.10 has an explicit override...
        let config = version_config("1.19.10").unwrap();
        let dependency = config
            .injections
            .iter()
            .find(|i| i.name == "dependency")
            .unwrap();
        assert_eq!(dependency.line, 896);

        // ...and it is also the best match for later point releases.
        let config = version_config("1.19.13").unwrap();
        let command_line = config
            .injections
            .iter()
            .find(|i| i.name == "command_line")
            .unwrap();
        assert_eq!(command_line.line, 3029);
    }

    #[test]
    fn versions_below_the_first_override_use_base_lines() {
        let config = version_config("1.19.5").unwrap();
        let dependency = config
            .injections
            .iter()
            .find(|i| i.name == "dependency")
            .unwrap();
        assert_eq!(dependency.line, 897);
    }

    #[test]
    fn partial_overrides_leave_other_injections_untouched() {
        let config = version_config("1.24.3").unwrap();
        let command_line = config
            .injections
            .iter()
            .find(|i| i.name == "command_line")
            .unwrap();
        assert_eq!(command_line.line, 3274);

        let dependency = config
            .injections
            .iter()
            .find(|i| i.name == "dependency")
            .unwrap();
        assert_eq!(dependency.line, 947);
    }

    #[test]
    fn unsupported_version_names_closest_lower() {
        let err = version_config("1.25.0").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1.25.0"));
        assert!(message.contains("1.24"));
    }

    #[test]
    fn unsupported_below_range_has_no_closest() {
        let err = version_config("1.10.0").unwrap_err();
        assert!(matches!(
            err,
            VersionError::NotSupported { closest: None, .. }
        ));
    }

    #[test]
    fn malformed_versions_are_rejected() {
        assert!(matches!(
            version_config("119"),
            Err(VersionError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn tuple_comparison_is_numeric_not_lexicographic() {
        assert_eq!(compare_versions("1.19.10", "1.19.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.9", "1.19"), Ordering::Less);
        assert_eq!(compare_versions("1.19.0", "1.19"), Ordering::Equal);
    }

    #[test]
    fn all_supported_minors_are_present() {
        let minors = list_supported_versions();
        for expected in ["1.19", "1.20", "1.21", "1.22", "1.23", "1.24"] {
            assert!(minors.iter().any(|m| m == expected), "missing {expected}");
        }
    }
}
