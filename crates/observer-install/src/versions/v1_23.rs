use std::collections::BTreeMap;

use super::config::{buildvcs_patch, standard_injections, VersionConfig};

pub fn config() -> VersionConfig {
    VersionConfig {
        go: "1.23".to_string(),
        base_version: "1.23.0".to_string(),
        notes: "Base config for Go 1.23.x - works for most patches".to_string(),
        injections: standard_injections(946, 3258, "cfg.BuildContext.ImportDir"),
        patches: buildvcs_patch(),
        overrides: BTreeMap::new(),
    }
}
