//! `lex subs list`.

use anyhow::Result;
use lex_config::LexConfig;
use lex_subscribers::SubscriberRegistry;

/// Print well-formed entries as `id HH:MM`; other lines are skipped.
pub async fn list(cfg: &LexConfig) -> Result<()> {
    let registry = SubscriberRegistry::new(&cfg.storage.subscribers_path);
    let subs = registry.list().await?;
    for s in &subs {
        println!("{} {}", s.id, s.time);
    }
    println!("total={}", subs.len());
    Ok(())
}
