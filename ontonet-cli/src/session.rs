//! Engine construction from a configuration directory

use anyhow::{Context, Result};
use ontonet_core::engine::CONFIG_FILE;
use ontonet_core::{Catalog, Engine, EngineConfig};
use std::path::Path;

/// Build an engine from `ontonet.yml` and every catalog file in `dir`
///
/// A missing directory yields an empty engine with default settings.
pub fn load_engine(dir: &Path) -> Result<Engine> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "configuration directory not found, starting empty");
        return Ok(Engine::with_defaults());
    }

    let config = EngineConfig::from_file(dir.join(CONFIG_FILE))
        .with_context(|| format!("Failed to load {}", dir.join(CONFIG_FILE).display()))?;
    let engine = Engine::new(config);

    let catalog = Catalog::load_dir(dir)
        .with_context(|| format!("Failed to read catalog files in {}", dir.display()))?;
    let summary = catalog
        .apply(&engine)
        .context("Failed to apply catalog definitions")?;
    tracing::debug!(%summary, "configuration loaded");

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontonet_core::{AttributeValue, Notice};

    #[test]
    fn test_missing_dir_gives_empty_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = load_engine(&dir.path().join("absent")).unwrap();
        assert!(engine.objects().is_empty());
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn test_sample_catalog_runs_without_rejections() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config");
        let engine = load_engine(&dir).unwrap();
        assert!(engine.config().enforce_permitted_actions);

        engine
            .update_attribute("req_2048", "security_level", "A")
            .unwrap();

        let rejected: Vec<String> = engine
            .notices()
            .iter()
            .filter(|n| matches!(n, Notice::ActionRejected { .. } | Notice::ActionNotFound { .. }))
            .map(|n| n.to_string())
            .collect();
        assert!(rejected.is_empty(), "rejected: {:?}", rejected);

        let platform = engine.object("test_platform_1").unwrap();
        assert_eq!(platform.attribute("power_status"), Some(&AttributeValue::from("on")));
        assert_eq!(platform.attribute("firmware"), Some(&AttributeValue::from("2.1")));
        assert!(engine.resource("hil_rig").unwrap().owner.is_some());
    }

    #[test]
    fn test_bad_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.yml"), "rules: [ { id: x } ]").unwrap();
        let err = load_engine(dir.path()).unwrap_err();
        assert!(err.to_string().contains("catalog"));
    }
}
