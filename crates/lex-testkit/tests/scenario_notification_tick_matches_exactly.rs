//! Scenario: notification ticks.
//!
//! # Invariants under test
//!
//! 1. A tick at 09:30 reaches exactly the subscribers stored as "09:30".
//! 2. A hand-edited "09:3" entry never matches and is not an error.
//! 3. A failing delivery does not stop the others in the same tick.
//! 4. Ticks never modify the registry file.
//! 5. Ticks keep running while a reconciliation cycle holds the gate.
//! 6. The message embeds a cache entry once the refresher has filled it.

use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use lex_gate::AvailabilityGate;
use lex_runtime::{CacheRefresher, ContentCache, NotificationScheduler, RefreshOutcome};
use lex_subscribers::SubscriberRegistry;
use lex_testkit::{RecordingNotifier, StaticContentSource};

const FILE: &str = "\
100-09:30
-200-09:30
300-09:3
400-10:00
junk line
500-09:30
";

struct Rig {
    _dir: tempfile::TempDir,
    registry_path: std::path::PathBuf,
    notifier: Arc<RecordingNotifier>,
    cache: Arc<ContentCache>,
    scheduler: NotificationScheduler,
}

fn rig() -> Result<Rig> {
    let dir = tempfile::tempdir()?;
    let registry_path = dir.path().join("subscribers.txt");
    std::fs::write(&registry_path, FILE)?;

    let notifier = Arc::new(RecordingNotifier::new());
    let cache = Arc::new(ContentCache::empty(dir.path().join("news.txt")));
    let scheduler = NotificationScheduler::new(
        Arc::new(SubscriberRegistry::new(&registry_path)),
        Arc::clone(&notifier) as Arc<dyn lex_runtime::Notifier>,
        Arc::clone(&cache),
    );
    Ok(Rig {
        _dir: dir,
        registry_path,
        notifier,
        cache,
        scheduler,
    })
}

#[tokio::test]
async fn tick_delivers_to_exact_matches_only() -> Result<()> {
    let rig = rig()?;
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 12).unwrap();

    let report = rig.scheduler.dispatch_tick(now).await?;
    assert_eq!(report.at.to_string(), "09:30");
    assert_eq!(report.due, 3);
    assert_eq!(
        rig.notifier.recipients(),
        vec!["100".to_string(), "-200".into(), "500".into()]
    );
    assert!(report.failed.is_empty());

    assert_eq!(std::fs::read_to_string(&rig.registry_path)?, FILE);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_is_reported_and_the_rest_proceed() -> Result<()> {
    let rig = rig()?;
    rig.notifier.fail_for("-200");
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();

    let report = rig.scheduler.dispatch_tick(now).await?;
    assert_eq!(report.failed, vec!["-200".to_string()]);
    assert_eq!(report.delivered, vec!["100".to_string(), "500".into()]);
    Ok(())
}

#[tokio::test]
async fn ticks_run_while_the_gate_is_sleeping() -> Result<()> {
    let rig = rig()?;
    let gate = AvailabilityGate::new();
    let _cycle = gate.begin_cycle().await;

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
    let report = rig.scheduler.dispatch_tick(now).await?;
    assert_eq!(report.delivered, vec!["400".to_string()]);
    Ok(())
}

#[tokio::test]
async fn message_carries_refreshed_cache_content() -> Result<()> {
    let rig = rig()?;
    let source = Arc::new(StaticContentSource::new(vec!["https://example.org/kepler".into()]));
    let refresher = CacheRefresher::new(Arc::clone(&rig.cache), source.clone());
    assert_eq!(refresher.refresh_once().await?, RefreshOutcome::Replaced(1));

    // An empty fetch later on keeps the entry.
    source.set(Vec::new());
    assert_eq!(refresher.refresh_once().await?, RefreshOutcome::KeptPrevious);

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
    rig.scheduler.dispatch_tick(now).await?;
    let sent = rig.notifier.delivered();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("https://example.org/kepler"));
    Ok(())
}
