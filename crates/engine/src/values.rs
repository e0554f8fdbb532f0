//! Helm `--set` values for each deployment flavour.

use std::collections::BTreeMap;

use chartcheck_core::config::ImageConfig;

fn values<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

/// Open source engine install.
pub fn engine_values(images: &ImageConfig) -> BTreeMap<String, String> {
    values([
        ("anchoreGlobal.image", images.engine.as_str()),
        ("anchoreGlobal.imagePullPolicy", images.pull_policy.as_str()),
    ])
}

/// Engine plus the enterprise services and UI.
pub fn enterprise_values(images: &ImageConfig) -> BTreeMap<String, String> {
    let mut map = engine_values(images);
    map.extend(values([
        ("anchoreEnterpriseGlobal.enabled", "True"),
        ("anchoreEnterpriseGlobal.image", images.enterprise.as_str()),
        ("anchoreEnterpriseGlobal.imagePullPolicy", images.pull_policy.as_str()),
        ("anchoreEnterpriseUi.image", images.ui.as_str()),
        ("anchoreEnterpriseUi.imagePullPolicy", images.pull_policy.as_str()),
    ]));
    map
}

/// Chart defaults with enterprise switched on, used by the UI scenario.
pub fn ui_values() -> BTreeMap<String, String> {
    values([("anchoreEnterpriseGlobal.enabled", "true")])
}
