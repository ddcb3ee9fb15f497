//! Shop Mailchimp addon service.
//!
//! Receives contact and order events from the shop platform, serves the
//! storefront newsletter signup and per-shop settings, and pushes eligible
//! emails to Mailchimp. Listens on port 3002 by default.

#![cfg_attr(not(test), forbid(unsafe_code))]

use sentry::integrations::tracing as sentry_tracing;
use shop_mailchimp_addon::{
    config::AddonConfig,
    db,
    dispatcher::Dispatcher,
    events::EventQueue,
    mailchimp::MailchimpClient,
    settings::ShopSettings,
    state::AppState,
    store::{SettingsStore, SyncRecordStore},
    sync::MailchimpSync,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AddonConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = AddonConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shop_mailchimp_addon=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p shop-mailchimp-cli -- migrate

    let client =
        MailchimpClient::new(&config.mailchimp).expect("Failed to create Mailchimp client");
    let settings = ShopSettings::new(
        SettingsStore::postgres(pool.clone()),
        config.settings_cache_ttl,
    );
    let sync = MailchimpSync::new(client, settings, SyncRecordStore::postgres(pool.clone()));
    let dispatcher = Dispatcher::new(sync);

    let (queue, worker) = EventQueue::spawn(dispatcher.clone(), config.event_queue_capacity);
    let state = AppState::new(dispatcher, queue, Some(pool), config.auth.clone());
    let app = shop_mailchimp_addon::app(state);

    let addr = config.socket_addr();
    tracing::info!("addon listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // The router (and with it the last queue sender) is gone; let the worker
    // finish what is already queued.
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Event worker panicked");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
