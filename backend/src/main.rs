#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), forbid(clippy::expect_used))]
//! Service entry-point: wires store, cache tiers, services, and the HTTP
//! listener, then runs until SIGINT/SIGTERM drains it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use lexicon_backend::domain::ports::{
    CacheTier, CatalogStore, NoopRegistry, Registry, ServiceRegistration, TokenVerifier,
};
use lexicon_backend::domain::{
    AdminService, CatalogService, InvalidationRetryTask, TieredCache,
};
use lexicon_backend::inbound::http::state::HttpState;
use lexicon_backend::outbound::auth::HmacTokenVerifier;
use lexicon_backend::outbound::cache::{MemoryCache, RedisCatalogCache};
use lexicon_backend::outbound::persistence::{DbPool, DieselCatalogStore, PoolConfig};
use lexicon_backend::server::{AppConfig, create_server};

/// Centralized localization catalog service.
#[derive(Debug, Parser)]
#[command(name = "lexicond", version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, value_name = "PATH", default_value = "lexicon.json")]
    config: std::path::PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    let config = AppConfig::load(&args.config).map_err(std::io::Error::other)?;

    let pool_section = &config.database.pool;
    let pool_config = PoolConfig::new(config.database.url())
        .with_max_size(pool_section.max_size)
        .with_min_idle(Some(pool_section.min_idle))
        .with_connection_timeout(Duration::from_secs(pool_section.connection_timeout_secs))
        .with_max_lifetime(Some(Duration::from_secs(pool_section.max_lifetime_secs)))
        .with_idle_timeout(Some(Duration::from_secs(pool_section.idle_timeout_secs)));
    let pool = DbPool::new(pool_config)
        .await
        .map_err(std::io::Error::other)?;
    let store: Arc<dyn CatalogStore> = Arc::new(DieselCatalogStore::new(pool));

    let memory = Arc::new(MemoryCache::new(config.cache.memory.to_memory_config()));
    let sweeper = memory.spawn_sweeper(Duration::from_secs(
        config.cache.memory.sweep_interval_secs,
    ));

    let distributed: Option<Arc<dyn CacheTier>> = match &config.cache.distributed {
        Some(section) => match section.url() {
            Some(url) => match RedisCatalogCache::connect(&url, section.pool_size).await {
                Ok(redis) => {
                    if let Err(err) = redis.ping().await {
                        // Reads must survive a dead distributed tier; the
                        // client reconnects on demand once it recovers.
                        warn!(error = %err, "distributed cache unreachable at startup; continuing degraded");
                    }
                    Some(Arc::new(redis))
                }
                Err(err) => {
                    warn!(error = %err, "distributed cache client failed to build; running process-tier only");
                    None
                }
            },
            None => None,
        },
        None => None,
    };

    let cache = Arc::new(TieredCache::new(
        Arc::clone(&memory) as Arc<dyn CacheTier>,
        distributed,
        config.cache.to_ttls(),
    ));

    let catalog = Arc::new(CatalogService::new(Arc::clone(&store), Arc::clone(&cache)));
    let admin = Arc::new(AdminService::new(Arc::clone(&store), Arc::clone(&cache)));
    let retry = InvalidationRetryTask::new(Arc::clone(&store), Arc::clone(&cache)).spawn();

    let verifier: Arc<dyn TokenVerifier> = Arc::new(HmacTokenVerifier::new(
        config.security.token_secret.expose(),
    ));
    let state = HttpState::new(
        catalog,
        admin,
        verifier,
        config.security.admin_role_set(),
        config.service.timeouts.to_timeouts(),
    );

    let (server, port) = create_server(state, &config.service)?;

    let registry = NoopRegistry;
    let registration = ServiceRegistration {
        name: "lexicon".to_owned(),
        host: config.service.host.clone(),
        port,
    };
    if let Err(err) = registry.register(&registration).await {
        warn!(error = %err, "service discovery registration failed");
    }

    info!(port, "lexicon catalog service started");
    // Actix installs SIGINT/SIGTERM handlers: the listener stops accepting
    // and drains in-flight requests before this returns.
    let outcome = server.await;

    if let Err(err) = registry.deregister(&registration).await {
        warn!(error = %err, "service discovery deregistration failed");
    }
    sweeper.abort();
    retry.abort();
    if let Err(err) = &outcome {
        error!(error = %err, "server terminated with error");
    }
    info!("lexicon catalog service stopped");
    outcome
}
