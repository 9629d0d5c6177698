//! Sawab server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sawab_api::{AppState, app};
use sawab_common::{Config, CounterCache, InMemoryCounterCache, RedisCounterCache};
use sawab_core::{
    AdminMessageService, BadgeEngine, BadgeService, ConversationService, EventPublisherService,
    InstitutionService, LifecycleJobs, LocalEventPublisher, NotificationService, OfferService,
    ReportService, RequestService, ReviewService, UserService,
};
use sawab_queue::{RedisPubSub, run_scheduler};
use fred::interfaces::ClientLike;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sawab=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting sawab server...");

    // Load configuration, from an explicit file when SAWAB_CONFIG is set
    let config = match std::env::var("SAWAB_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::load()?,
    };

    // Connect to database
    let db = Arc::new(sawab_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    sawab_db::migrate(&db).await?;
    info!("Migrations completed");

    // Realtime events always land in the local publisher; with Redis they
    // travel through Pub/Sub first so every process sees them.
    let events = LocalEventPublisher::default();
    let counter_ttl = Duration::from_secs(config.cache.counter_ttl_secs);

    let (cache, publisher, pubsub): (Arc<dyn CounterCache>, EventPublisherService, _) =
        if let Some(redis_url) = config.redis.url.as_deref() {
            info!("Connecting to Redis...");
            let redis_config = fred::types::config::Config::from_url(redis_url)?;
            let client = fred::clients::Client::new(redis_config, None, None, None);
            client.connect();
            client.wait_for_connect().await?;
            let cache = RedisCounterCache::new(Arc::new(client), &config.redis.prefix, counter_ttl);

            let pubsub = RedisPubSub::new(redis_url, &config.redis.prefix, events.clone()).await?;
            pubsub.start().await?;
            info!("Connected to Redis");

            (Arc::new(cache), Arc::new(pubsub.clone()), Some(pubsub))
        } else {
            info!("No Redis configured, using in-process cache and events");
            (
                Arc::new(InMemoryCounterCache::with_ttl(counter_ttl)),
                Arc::new(events.clone()),
                None,
            )
        };

    // Initialize services
    let admin_message_service = AdminMessageService::new(db.clone(), cache.clone());
    let mut notification_service = NotificationService::new(db.clone(), cache);
    notification_service.set_event_publisher(publisher.clone());

    let request_service = RequestService::new(
        db.clone(),
        BadgeEngine::new(db.clone(), config.badges.clone()),
        notification_service.clone(),
        config.lifecycle.clone(),
    );
    let mut conversation_service =
        ConversationService::new(db.clone(), notification_service.clone());
    conversation_service.set_event_publisher(publisher);

    let jobs = Arc::new(LifecycleJobs::new(
        db.clone(),
        request_service.clone(),
        notification_service.clone(),
        config.lifecycle.clone(),
    ));
    let scheduler = run_scheduler(&config.scheduler, jobs);

    let state = AppState {
        user_service: UserService::new(db.clone()),
        offer_service: OfferService::new(db.clone(), notification_service.clone()),
        report_service: ReportService::new(db.clone(), notification_service.clone()),
        institution_service: InstitutionService::new(db.clone(), notification_service.clone()),
        badge_service: BadgeService::new(db.clone(), notification_service.clone()),
        review_service: ReviewService::new(db),
        admin_message_service,
        request_service,
        conversation_service,
        notification_service,
        events,
    };

    let app = app(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in scheduler {
        handle.abort();
    }
    if let Some(pubsub) = pubsub
        && let Err(e) = pubsub.shutdown().await
    {
        error!(error = %e, "Failed to shut down Redis Pub/Sub");
    }

    info!("Server shutdown complete");
    Ok(())
}
