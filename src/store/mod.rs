//! The capability-set abstraction (§6.2, §9d) the Engine is generic over.
//!
//! Two concrete variants are provided: [`redis::RedisStore`], a thin wrapper
//! over `redis::aio::ConnectionManager`, and [`memory::MemoryStore`], an
//! in-process store used by the property tests in §8 and as a zero-dependency
//! local/dev backend.

pub mod memory;
pub mod redis;

use std::{error, fmt};

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Due-and-route counts returned by [`Store::due_and_route`]: jobs moved to
/// the ready queue vs. jobs moved to the dead letter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PumpCounts {
    pub to_ready: u64,
    pub to_dead_letter: u64,
}

/// A value popped off a blocking multi-queue pop, tagged with the key it came
/// from (so the caller can recover which `(namespace, queue)` it belongs to).
#[derive(Clone, Debug)]
pub struct PoppedEntry {
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Debug)]
pub enum StoreError {
    /// The backing client/transport failed (connection, protocol, timeout).
    Transport(String),
    /// A script invocation failed for a non-transport reason after the
    /// `NOSCRIPT` reload-and-retry policy (§7) was already applied once.
    Script(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
            StoreError::Script(msg) => write!(f, "script error: {msg}"),
        }
    }
}

impl error::Error for StoreError {}

/// The backing-store capability set required by the core (§6.2).
///
/// Every method is a single round-trip (or, for `due_and_route`/`destroy`/
/// `dead_letter_respawn`/`dead_letter_delete`, a single atomic script
/// invocation) — no method holds a lock across another method's await point.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Writes `value` under `key`. `ttl_seconds == None` means no expiry;
    /// any existing value at `key` is overwritten.
    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u32>,
    ) -> Result<(), StoreError>;

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn kv_del(&self, key: &str) -> Result<(), StoreError>;

    /// Appends `value` to the queue named by `key` (the push end of the FIFO).
    async fn list_push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Non-blocking pop from the opposite end of the FIFO from `list_push`.
    async fn list_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Blocking pop across any of `keys`, waiting up to `timeout_seconds`
    /// (0 meaning block forever; callers in this crate never pass 0 here —
    /// the zero-timeout, single-queue case is routed through `list_pop`).
    async fn list_blocking_pop(
        &self,
        keys: &[String],
        timeout_seconds: u32,
    ) -> Result<Option<PoppedEntry>, StoreError>;

    async fn list_peek_head(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Registers one queue's timer key with the pump registry and inserts a
    /// due-at-`fire_at_unix` member into its timer zset. Two round-trips, not
    /// required to be atomic with each other (§9's non-atomic pop-then-schedule
    /// note applies symmetrically here: worst case is a registry entry with an
    /// empty zset, which the pump script prunes harmlessly).
    async fn timer_add(
        &self,
        timer_key: &str,
        registry_key: &str,
        registry_member: &str,
        fire_at_unix: i64,
        member: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Cancels a single pending timer member, if present.
    async fn timer_remove(&self, timer_key: &str, member: &[u8]) -> Result<(), StoreError>;

    /// The set of `"namespace/queue"` registry members currently known to
    /// have (or to have recently had) pending timer entries.
    async fn timer_registry_members(&self, registry_key: &str) -> Result<Vec<String>, StoreError>;

    /// Atomically moves all members of `timer_key` due at or before `now_unix`
    /// to `ready_key` (remaining_tries > 0) or `dead_letter_key`
    /// (remaining_tries == 0), pruning `registry_member` from the registry
    /// once the timer zset is empty (§4.4).
    async fn due_and_route(
        &self,
        timer_key: &str,
        ready_key: &str,
        dead_letter_key: &str,
        registry_key: &str,
        registry_member: &str,
        now_unix: i64,
    ) -> Result<PumpCounts, StoreError>;

    /// Atomically pops up to `limit` ids from the head of `dead_letter_key`,
    /// re-publishes each to the tail of `ready_key` with `remaining_tries = 1`,
    /// and refreshes each body's TTL under `pool_key_prefix`. Returns the
    /// count processed (§4.5).
    async fn dead_letter_respawn(
        &self,
        dead_letter_key: &str,
        ready_key: &str,
        pool_key_prefix: &str,
        limit: u32,
        ttl_seconds: u32,
    ) -> Result<u64, StoreError>;

    /// Atomically pops and discards up to `limit` ids from `dead_letter_key`,
    /// deleting each body under `pool_key_prefix`. Returns the count processed.
    async fn dead_letter_delete(
        &self,
        dead_letter_key: &str,
        pool_key_prefix: &str,
        limit: u32,
    ) -> Result<u64, StoreError>;

    /// Atomically erases up to `batch` entries total from `ready_key`,
    /// `dead_letter_key` and `timer_key`, deleting each referenced body under
    /// `pool_key_prefix`, pruning `registry_member` once all three are empty.
    /// Returns the count processed; callers loop until it returns 0 (§4.2).
    async fn destroy_batch(
        &self,
        ready_key: &str,
        dead_letter_key: &str,
        timer_key: &str,
        registry_key: &str,
        registry_member: &str,
        pool_key_prefix: &str,
        batch: u32,
    ) -> Result<u64, StoreError>;
}
