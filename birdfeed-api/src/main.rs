use birdfeed_cache::client::{CacheClient, CacheError, FeedCacheConfig, RedisTimeouts};
use birdfeed_common::util::{NonPositiveDurationError, PositiveDuration};
use birdfeed_db::client::{DbClient, DbError};
use birdfeed_timeline::{Timeline, TracingEvents};
use serde::Deserialize;
use server::ServerState;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
    time::Duration,
};
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DATABASE_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REDIS_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REDIS_RESPONSE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_FAN_OUT_DRAIN_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("FEED_TTL_SECONDS is invalid: {0}")]
    FeedTtl(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error connecting to the feed cache: {0}")]
    Cache(#[from] CacheError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default = "default_database_statement_timeout_ms")]
    database_statement_timeout_ms: u64,
    redis_url: String,
    #[serde(default = "default_redis_connect_timeout_ms")]
    redis_connect_timeout_ms: u64,
    #[serde(default = "default_redis_response_timeout_ms")]
    redis_response_timeout_ms: u64,
    feed_max_entries: Option<NonZeroUsize>,
    feed_ttl_seconds: Option<i64>,
    #[serde(default = "default_fan_out_drain_timeout_ms")]
    fan_out_drain_timeout_ms: u64,
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_database_statement_timeout_ms() -> u64 {
    DEFAULT_DATABASE_STATEMENT_TIMEOUT_MS
}

fn default_redis_connect_timeout_ms() -> u64 {
    DEFAULT_REDIS_CONNECT_TIMEOUT_MS
}

fn default_redis_response_timeout_ms() -> u64 {
    DEFAULT_REDIS_RESPONSE_TIMEOUT_MS
}

fn default_fan_out_drain_timeout_ms() -> u64 {
    DEFAULT_FAN_OUT_DRAIN_TIMEOUT_MS
}

impl Env {
    fn redis_timeouts(&self) -> RedisTimeouts {
        RedisTimeouts {
            connect: Duration::from_millis(self.redis_connect_timeout_ms),
            response: Duration::from_millis(self.redis_response_timeout_ms),
        }
    }

    fn feed_cache_config(&self) -> Result<FeedCacheConfig, NonPositiveDurationError> {
        Ok(FeedCacheConfig {
            max_entries: self.feed_max_entries,
            ttl: self
                .feed_ttl_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "birdfeed_api=debug,\
                birdfeed_cache=debug,\
                birdfeed_common=debug,\
                birdfeed_db=debug,\
                birdfeed_timeline=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown requested");
}

/// Waits for in-flight fan-outs, giving up after `deadline`. Fan-outs still
/// running then are abandoned along with their remaining pushes.
async fn drain_fan_out(fan_out_tasks: &TaskTracker, deadline: Duration) -> bool {
    fan_out_tasks.close();
    info!(pending = fan_out_tasks.len(), "Waiting for fan-out tasks");

    let drained = tokio::time::timeout(deadline, fan_out_tasks.wait())
        .await
        .is_ok();
    if !drained {
        warn!(
            pending = fan_out_tasks.len(),
            ?deadline,
            "Gave up waiting for fan-out tasks"
        );
    }
    drained
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let feed_cache_config = env.feed_cache_config()?;

    let db = DbClient::connect(
        &env.database_url,
        env.database_max_connections,
        Duration::from_millis(env.database_statement_timeout_ms),
    )
    .await?;
    db.migrate().await?;
    let cache = CacheClient::connect(&env.redis_url, feed_cache_config, env.redis_timeouts()).await?;
    cache.ping().await?;

    let fan_out_tasks = TaskTracker::new();
    let timeline = Timeline::new(db, cache, TracingEvents, fan_out_tasks.clone());

    let app = server::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(ServerState { timeline });

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    drain_fan_out(&fan_out_tasks, Duration::from_millis(env.fan_out_drain_timeout_ms)).await;

    Ok(())
}
