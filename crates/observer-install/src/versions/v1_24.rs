use std::collections::BTreeMap;

use super::config::{
    buildvcs_patch, standard_injections, InjectionOverride, VersionConfig, VersionOverride,
};

pub fn config() -> VersionConfig {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "1.24.3".to_string(),
        VersionOverride {
            injections: vec![InjectionOverride {
                name: "command_line".to_string(),
                line: 3274,
            }],
            patches: Vec::new(),
        },
    );

    VersionConfig {
        go: "1.24".to_string(),
        base_version: "1.24.0".to_string(),
        notes: "Base config for Go 1.24.x - pkg.go with Happy: label and goFilesPackage"
            .to_string(),
        injections: standard_injections(947, 3269, "buildContext.ImportDir"),
        patches: buildvcs_patch(),
        overrides,
    }
}
