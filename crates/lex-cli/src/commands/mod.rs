//! Command handler modules for the `lex` CLI.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod mirror;
pub mod subs;

use anyhow::Result;
use lex_config::{LexConfig, LoadedConfig, UnusedKeyPolicy};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load `--config` layers when given, else the layers named by `LEX_CONFIG`.
/// Keys nobody reads are reported on stderr, never fatal.
pub fn load_settings(paths: &[String]) -> Result<(LoadedConfig, LexConfig)> {
    let loaded = if paths.is_empty() {
        lex_config::load_from_env()?
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        lex_config::load_layered_yaml(&refs)?
    };
    warn_unused_keys(&loaded)?;
    let cfg = loaded.settings()?;
    Ok((loaded, cfg))
}

pub fn warn_unused_keys(loaded: &LoadedConfig) -> Result<()> {
    let report = lex_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        eprintln!("WARN unused config key: {ptr}");
    }
    Ok(())
}
