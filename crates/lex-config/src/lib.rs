//! lex-config
//!
//! Layered YAML configuration for the LEXArchive mirror.
//!
//! - YAML layers merge in order (earlier = base, later = override).
//! - The merged document is canonicalised to JSON and SHA-256 hashed so an
//!   operator can tell two deployments apart by `config_hash`.
//! - Literal secret-looking values are refused (`CONFIG_SECRET_DETECTED`).
//! - Keys nobody reads are reported (`report_unused_keys`).
//! - [`LexConfig`] is the typed view every binary consumes.

mod consumption;
mod settings;
mod unused;

pub use consumption::consumed_pointers;
pub use settings::*;
pub use unused::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Env var holding the comma-separated list of YAML layers.
pub const ENV_CONFIG_PATHS: &str = "LEX_CONFIG";

/// Prefixes of credentials that must come from the environment, never a file.
const SECRET_PREFIXES: &[&str] = &["sk-", "AKIA", "-----BEGIN", "ghp_", "glpat-", "xoxb-"];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged document.
    pub fn settings(&self) -> Result<LexConfig> {
        LexConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("read config layer {p}")))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for (idx, raw) in yaml_docs.iter().enumerate() {
        let layer: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("config layer #{idx} is not yaml"))?;
        // Empty file.
        if layer.is_null() {
            continue;
        }
        let layer = serde_json::to_value(layer).context("yaml layer has no json form")?;
        overlay(&mut merged, layer);
    }

    refuse_secret_literals(&merged)?;

    // serde_json::Map is key-ordered, so this string is canonical.
    let canonical_json = serde_json::to_string(&merged).context("serialize merged config")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Load the layers named by `LEX_CONFIG` (comma-separated). An unset or empty
/// variable yields the all-defaults configuration.
pub fn load_from_env() -> Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    load_layered_yaml(&paths)
}

/// Objects merge key by key; anything else in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (k, v) in top_map {
                overlay(base_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, v) => *slot = v,
    }
}

fn refuse_secret_literals(doc: &Value) -> Result<()> {
    let hit = unused::leaf_pointers(doc).into_iter().find(|ptr| {
        doc.pointer(ptr)
            .and_then(Value::as_str)
            .is_some_and(looks_like_secret)
    });
    if let Some(ptr) = hit {
        bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
