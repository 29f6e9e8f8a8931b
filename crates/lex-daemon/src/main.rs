//! lex-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads configuration,
//! wires the mirror, registry, cache and background loops into shared state,
//! attaches middleware, and starts the HTTP server. All route handlers live
//! in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use lex_archive::{Archive, TapArchive};
use lex_config::LexConfig;
use lex_daemon::{notifier::BusNotifier, routes, state};
use lex_gate::AvailabilityGate;
use lex_runtime::{
    open_mirror, spawn_cache_refresh_loop, spawn_notification_loop, spawn_reconcile_loop,
    tap_config, CacheRefresher, ContentCache, HttpListSource, LexService, NotificationScheduler,
    ReconciliationEngine,
};
use lex_subscribers::SubscriberRegistry;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = lex_config::load_from_env()?;
    let cfg: LexConfig = loaded.settings()?;
    info!(config_hash = %loaded.config_hash, "configuration loaded");

    // The gate starts AWAKE; the first cycle below puts it to sleep.
    let gate = Arc::new(AvailabilityGate::new());

    let mirror = open_mirror(&cfg).await?;
    let archive: Arc<dyn Archive> = Arc::new(TapArchive::new(
        tap_config(&cfg.archive),
        mirror.catalog().clone(),
    )?);
    let engine = Arc::new(ReconciliationEngine::new(
        archive,
        mirror.clone(),
        Arc::clone(&gate),
    ));

    let registry = Arc::new(SubscriberRegistry::new(&cfg.storage.subscribers_path));
    let cache = Arc::new(
        ContentCache::load(&cfg.storage.news_path)
            .await
            .context("load content cache")?,
    );

    // Engine and service share one pool; the gate orders their access.
    let service = Arc::new(LexService::new(
        Arc::clone(&gate),
        mirror,
        Arc::clone(&registry),
        Arc::clone(&cache),
        cfg.paging.page_size,
        cfg.paging.lookup_limit,
    ));
    let shared = Arc::new(state::AppState::new(service));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    {
        let st = Arc::clone(&shared);
        spawn_reconcile_loop(
            Arc::clone(&engine),
            cfg.schedule.reconcile_interval(),
            move |result| st.record_cycle(result),
        );
    }

    {
        let scheduler = Arc::new(NotificationScheduler::new(
            Arc::clone(&registry),
            Arc::new(BusNotifier::new(shared.bus.clone())),
            Arc::clone(&cache),
        ));
        let st = Arc::clone(&shared);
        spawn_notification_loop(scheduler, cfg.schedule.notification_tick(), move |result| {
            st.record_tick(result)
        });
    }

    match &cfg.news.source_url {
        Some(url) => {
            let source = Arc::new(HttpListSource::new(url, cfg.archive.timeout())?);
            spawn_cache_refresh_loop(
                Arc::new(CacheRefresher::new(Arc::clone(&cache), source)),
                cfg.schedule.cache_refresh_interval(),
            );
        }
        None => info!("news.source_url not set; content cache will not refresh"),
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or_else(|| cfg.daemon.addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("lex-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("LEX_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
