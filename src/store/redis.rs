//! [`Store`] backed by a real Redis-compatible server via the `redis` crate.
//!
//! Grounded in the `apalis-redis` storage adapter's pattern: scripts are
//! compiled once via `redis::Script::new(include_str!(...))` and invoked
//! through a cloned `ConnectionManager`; `redis::Script::invoke_async`
//! transparently retries with a plain `EVAL` on `NOSCRIPT`, which is the
//! "reload and retry once" recovery policy §7 and §9 require.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisError, Script};

use super::{PoppedEntry, PumpCounts, Store, StoreError};

fn transport_err(e: RedisError) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn script_err(e: RedisError) -> StoreError {
    StoreError::Script(e.to_string())
}

#[derive(Clone)]
struct Scripts {
    due_and_route: Script,
    destroy_batch: Script,
    dead_letter_respawn: Script,
    dead_letter_delete: Script,
}

impl Scripts {
    fn load() -> Self {
        Scripts {
            due_and_route: Script::new(include_str!("../../scripts/due_and_route.lua")),
            destroy_batch: Script::new(include_str!("../../scripts/destroy_queue.lua")),
            dead_letter_respawn: Script::new(include_str!("../../scripts/dead_letter_respawn.lua")),
            dead_letter_delete: Script::new(include_str!("../../scripts/dead_letter_delete.lua")),
        }
    }
}

/// A [`Store`] backed by `redis::aio::ConnectionManager`. Cheap to clone —
/// the manager is itself a handle over a multiplexed, auto-reconnecting
/// connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    scripts: Scripts,
}

impl RedisStore {
    pub async fn connect<S: IntoConnectionInfo>(addr: S) -> Result<Self, StoreError> {
        let client = Client::open(addr.into_connection_info().map_err(transport_err)?)
            .map_err(transport_err)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(transport_err)?;
        Ok(RedisStore {
            conn,
            scripts: Scripts::load(),
        })
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(ttl) if ttl > 0 => conn
                .set_ex::<_, _, ()>(key, value, ttl as u64)
                .await
                .map_err(transport_err),
            _ => conn.set::<_, _, ()>(key, value).await.map_err(transport_err),
        }
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(transport_err)
    }

    async fn kv_del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(transport_err)
    }

    async fn list_push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value).await.map_err(transport_err)
    }

    async fn list_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        conn.rpop(key, None).await.map_err(transport_err)
    }

    async fn list_blocking_pop(
        &self,
        keys: &[String],
        timeout_seconds: u32,
    ) -> Result<Option<PoppedEntry>, StoreError> {
        let mut conn = self.conn.clone();
        let result: Option<(String, Vec<u8>)> = conn
            .brpop(keys, timeout_seconds as f64)
            .await
            .map_err(transport_err)?;
        Ok(result.map(|(key, value)| PoppedEntry { key, value }))
    }

    async fn list_peek_head(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        conn.lindex(key, -1).await.map_err(transport_err)
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.llen(key).await.map_err(transport_err)
    }

    async fn timer_add(
        &self,
        timer_key: &str,
        registry_key: &str,
        registry_member: &str,
        fire_at_unix: i64,
        member: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(registry_key, registry_member)
            .await
            .map_err(transport_err)?;
        conn.zadd::<_, _, _, ()>(timer_key, member, fire_at_unix)
            .await
            .map_err(transport_err)
    }

    async fn timer_remove(&self, timer_key: &str, member: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.zrem::<_, _, ()>(timer_key, member)
            .await
            .map_err(transport_err)
    }

    async fn timer_registry_members(&self, registry_key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(registry_key).await.map_err(transport_err)
    }

    async fn due_and_route(
        &self,
        timer_key: &str,
        ready_key: &str,
        dead_letter_key: &str,
        registry_key: &str,
        registry_member: &str,
        now_unix: i64,
    ) -> Result<PumpCounts, StoreError> {
        let mut conn = self.conn.clone();
        let result: Vec<u64> = self
            .scripts
            .due_and_route
            .key(timer_key)
            .key(ready_key)
            .key(dead_letter_key)
            .key(registry_key)
            .arg(now_unix)
            .arg(registry_member)
            .invoke_async(&mut conn)
            .await
            .map_err(script_err)?;

        Ok(PumpCounts {
            to_ready: result.first().copied().unwrap_or(0),
            to_dead_letter: result.get(1).copied().unwrap_or(0),
        })
    }

    async fn dead_letter_respawn(
        &self,
        dead_letter_key: &str,
        ready_key: &str,
        pool_key_prefix: &str,
        limit: u32,
        ttl_seconds: u32,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.scripts
            .dead_letter_respawn
            .key(dead_letter_key)
            .key(ready_key)
            .arg(limit)
            .arg(ttl_seconds)
            .arg(pool_key_prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(script_err)
    }

    async fn dead_letter_delete(
        &self,
        dead_letter_key: &str,
        pool_key_prefix: &str,
        limit: u32,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.scripts
            .dead_letter_delete
            .key(dead_letter_key)
            .arg(limit)
            .arg(pool_key_prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(script_err)
    }

    async fn destroy_batch(
        &self,
        ready_key: &str,
        dead_letter_key: &str,
        timer_key: &str,
        registry_key: &str,
        registry_member: &str,
        pool_key_prefix: &str,
        batch: u32,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.scripts
            .destroy_batch
            .key(ready_key)
            .key(dead_letter_key)
            .key(timer_key)
            .key(registry_key)
            .arg(pool_key_prefix)
            .arg(registry_member)
            .arg(batch)
            .invoke_async(&mut conn)
            .await
            .map_err(script_err)
    }
}
