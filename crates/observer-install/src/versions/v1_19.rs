use std::collections::BTreeMap;

use super::config::{
    buildvcs_patch, standard_injections, InjectionOverride, VersionConfig, VersionOverride,
};

pub fn config() -> VersionConfig {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        "1.19.10".to_string(),
        VersionOverride {
            injections: vec![
                InjectionOverride {
                    name: "dependency".to_string(),
                    line: 896,
                },
                InjectionOverride {
                    name: "command_line".to_string(),
                    line: 3029,
                },
            ],
            patches: Vec::new(),
        },
    );

    VersionConfig {
        go: "1.19".to_string(),
        base_version: "1.19.0".to_string(),
        notes: "Base config for Go 1.19.x - works for most patches".to_string(),
        injections: standard_injections(897, 3027, "cfg.BuildContext.ImportDir"),
        patches: buildvcs_patch(),
        overrides,
    }
}
