//! Redis backed implementation of every fastgets repository.
//!
//! Atomic read-modify-write operations run as Lua scripts (see [`scripts`]);
//! multi-key writes without a read use `MULTI`/`EXEC` pipelines. The claim
//! script addresses task hashes it does not declare in `KEYS`, so a single
//! Redis node (not Redis Cluster) is required.

mod bits;
mod codec;
mod jobs;
mod keys;
mod records;
mod scripts;
mod tasks;

use std::sync::Arc;

use fastgets_core::config::StorageConfig;
use fastgets_core::{FastgetsError, FastgetsResult};
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, info};

pub use keys::KeySpace;
use scripts::Scripts;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    keys: KeySpace,
    scripts: Arc<Scripts>,
}

impl RedisStore {
    /// Open a managed connection and verify it with `PING`.
    pub async fn connect(config: &StorageConfig) -> FastgetsResult<Self> {
        info!("Connecting to Redis at {}", config.redis_url);

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| FastgetsError::storage(format!("Failed to create Redis client: {e}")))?;

        let mut conn = tokio::time::timeout(
            config.connection_timeout(),
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            FastgetsError::storage(format!(
                "Connection timeout after {} seconds",
                config.connection_timeout_seconds
            ))
        })?
        .map_err(|e| FastgetsError::storage(format!("Failed to connect to Redis: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(storage_error("PING"))?;

        debug!("Redis connection verified, key prefix '{}'", config.key_prefix);

        Ok(Self {
            conn,
            keys: KeySpace::new(config.key_prefix.clone()),
            scripts: Arc::new(Scripts::load()),
        })
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// ConnectionManager is a cheap handle over one multiplexed connection.
    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub async fn health_check(&self) -> FastgetsResult<()> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(storage_error("PING"))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.keys.prefix())
            .finish()
    }
}

pub(crate) fn storage_error(operation: &'static str) -> impl Fn(redis::RedisError) -> FastgetsError {
    move |e| FastgetsError::storage(format!("Redis {operation} failed: {e}"))
}
