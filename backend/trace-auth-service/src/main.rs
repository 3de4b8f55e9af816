/// Trace Auth Service Main Entry Point
///
/// Starts the HTTP server with:
/// - Credential codec (HS256)
/// - Redis or in-memory credential and trace stores
/// - Identity service client
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use crypto_core::{JwtCodec, TokenLifetimes};
use redis_utils::RedisPool;
use std::sync::Arc;
use std::time::Duration;
use trace_auth_service::{
    config::{Settings, StoreBackend},
    db::{
        MemoryTokenStore, MemoryTraceStore, RedisTokenStore, RedisTraceStore, TokenStore,
        TraceStore,
    },
    handlers, metrics,
    services::HttpIdentityClient,
    AppState,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sweep interval for the in-memory stores
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trace_auth_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting trace-auth-service");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!(
        host = %settings.server.host,
        port = settings.server.port,
        backend = ?settings.store.backend,
        "Configuration loaded"
    );

    metrics::init_metrics();

    let codec = JwtCodec::new(
        settings.jwt.secret.as_bytes(),
        TokenLifetimes::new(settings.jwt.access_ttl, settings.jwt.refresh_ttl),
    );

    let (token_store, trace_store) = build_stores(&settings).await?;

    let identity = HttpIdentityClient::new(
        &settings.identity.base_url,
        &settings.identity.verify_path,
        settings.identity.timeout,
    )
    .context("Failed to initialize identity client")?;
    info!(url = %identity.verify_url(), "Identity client initialized");

    let state = AppState::new(codec, token_store, trace_store, Arc::new(identity));

    let bind_addr = (settings.server.host.clone(), settings.server.port);
    info!("Starting HTTP server on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .workers(settings.server.workers.max(1))
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("trace-auth-service stopped");
    Ok(())
}

async fn build_stores(settings: &Settings) -> Result<(Arc<dyn TokenStore>, Arc<dyn TraceStore>)> {
    match settings.store.backend {
        StoreBackend::Redis => {
            let url = settings
                .store
                .redis_url
                .as_deref()
                .context("REDIS_URL must be set when STORE_BACKEND=redis")?;
            let pool = RedisPool::connect(url, settings.store.connection_timeout)
                .await
                .context("Failed to connect to Redis")?;
            info!(endpoint = %pool.endpoint(), "Redis stores initialized");

            let token_store = RedisTokenStore::new(
                pool.manager(),
                settings.jwt.refresh_ttl,
                settings.store.response_timeout,
            );
            let trace_store = RedisTraceStore::new(
                pool.manager(),
                settings.trace.ttl,
                settings.store.response_timeout,
            );
            Ok((
                Arc::new(token_store) as Arc<dyn TokenStore>,
                Arc::new(trace_store) as Arc<dyn TraceStore>,
            ))
        }
        StoreBackend::Memory => {
            let token_store = Arc::new(MemoryTokenStore::new(settings.jwt.refresh_ttl));
            let trace_store = Arc::new(MemoryTraceStore::new(settings.trace.ttl));
            spawn_memory_purge(token_store.clone(), trace_store.clone());
            info!("In-memory stores initialized; state is lost on restart");

            Ok((
                token_store as Arc<dyn TokenStore>,
                trace_store as Arc<dyn TraceStore>,
            ))
        }
    }
}

fn spawn_memory_purge(tokens: Arc<MemoryTokenStore>, traces: Arc<MemoryTraceStore>) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let records = tokens.purge_expired();
            let bindings = traces.purge_expired();
            if records + bindings > 0 {
                debug!(records, bindings, "Purged expired in-memory entries");
            }
        }
    });
}
