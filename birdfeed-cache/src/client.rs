//! Redis backed feed cache.
//!
//! Every feed is a Redis list with the newest post id at the head. Lists are
//! unbounded and never expire unless [`FeedCacheConfig`] sets a cap or a TTL;
//! either one is applied in the same `MULTI` transaction as the push.
//!
//! Every command is bounded by [`RedisTimeouts::response`].

use birdfeed_common::{store::FeedCache, util::PositiveDuration};
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use std::{num::NonZeroUsize, time::Duration};
use thiserror::Error;
use tracing::info;

pub type Result<T, E = CacheError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Connecting to Redis failed: {0}")]
    Connect(#[source] RedisError),
    #[error("Connecting to Redis did not finish within {0:?}")]
    ConnectTimedOut(Duration),
    #[error("Redis {command} on key {key} failed: {source}")]
    Command {
        command: &'static str,
        key: String,
        #[source]
        source: RedisError,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct FeedCacheConfig {
    /// Feeds are trimmed to this many ids after every push.
    pub max_entries: Option<NonZeroUsize>,
    /// Every push resets the feed's expiry to this duration.
    pub ttl: Option<PositiveDuration>,
}

impl FeedCacheConfig {
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.ttl.is_none()
    }
}

// Reconnect backoff, same as `ConnectionManager::new`.
const RECONNECT_EXPONENT_BASE: u64 = 2;
const RECONNECT_FACTOR: u64 = 100;
const RECONNECT_RETRIES: usize = 6;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct RedisTimeouts {
    /// Bounds establishing the connection, retries included.
    pub connect: Duration,
    /// Bounds every single command once connected.
    pub response: Duration,
}

impl Default for RedisTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            response: Duration::from_secs(3),
        }
    }
}

#[derive(Clone)]
pub struct CacheClient {
    connection: ConnectionManager,
    config: FeedCacheConfig,
}

impl CacheClient {
    pub async fn connect(
        redis_url: &str,
        config: FeedCacheConfig,
        timeouts: RedisTimeouts,
    ) -> Result<Self> {
        let client = Client::open(redis_url).map_err(CacheError::Connect)?;
        let connecting = ConnectionManager::new_with_backoff_and_timeouts(
            client,
            RECONNECT_EXPONENT_BASE,
            RECONNECT_FACTOR,
            RECONNECT_RETRIES,
            timeouts.response,
            timeouts.connect,
        );
        let connection = tokio::time::timeout(timeouts.connect, connecting)
            .await
            .map_err(|_| CacheError::ConnectTimedOut(timeouts.connect))?
            .map_err(CacheError::Connect)?;

        info!(?config, ?timeouts, "Connected to Redis");
        Ok(Self { connection, config })
    }

    #[must_use]
    pub fn config(&self) -> FeedCacheConfig {
        self.config
    }

    pub async fn ping(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await
            .map_err(CacheError::Connect)?;

        Ok(())
    }
}

/// Inclusive index of the last element of a head range holding `count` items.
fn last_index(count: NonZeroUsize) -> isize {
    isize::try_from(count.get() - 1).unwrap_or(isize::MAX)
}

impl FeedCache for CacheClient {
    type Error = CacheError;

    async fn push_front(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();

        if self.config.is_unbounded() {
            return connection
                .lpush::<_, _, ()>(key, value)
                .await
                .map_err(|source| CacheError::Command {
                    command: "LPUSH",
                    key: key.to_owned(),
                    source,
                });
        }

        let mut pipe = redis::pipe();
        pipe.atomic().lpush(key, value).ignore();
        if let Some(max_entries) = self.config.max_entries {
            pipe.ltrim(key, 0, last_index(max_entries)).ignore();
        }
        if let Some(ttl) = self.config.ttl {
            pipe.expire(key, ttl.whole_seconds_ceil()).ignore();
        }

        pipe.query_async::<_, ()>(&mut connection)
            .await
            .map_err(|source| CacheError::Command {
                command: "MULTI LPUSH",
                key: key.to_owned(),
                source,
            })
    }

    async fn range_from_head(&self, key: &str, count: NonZeroUsize) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();

        connection
            .lrange(key, 0, last_index(count))
            .await
            .map_err(|source| CacheError::Command {
                command: "LRANGE",
                key: key.to_owned(),
                source,
            })
    }
}
