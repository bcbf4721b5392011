//! An in-process [`Store`] built from `tokio::sync::Mutex`-guarded data
//! structures (§9d). Every "script" method takes the mutex for its whole
//! critical section, which reproduces the atomicity the Redis variant gets
//! from server-side Lua — sufficient for the property tests in §8 and for
//! local/dev use without a Redis instance.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Duration};

use super::{PoppedEntry, PumpCounts, Store, StoreError};
use crate::codec::ReadyEntry;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<i64>,
}

#[derive(Default)]
struct State {
    kv: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    // zset: key -> (score, member) kept sorted by score via BTreeMap<score, Vec<member>>
    zsets: HashMap<String, BTreeMap<i64, Vec<Vec<u8>>>>,
    registry: HashMap<String, HashSet<String>>,
}

impl State {
    fn kv_get(&mut self, key: &str) -> Option<Vec<u8>> {
        let now = now_unix();
        match self.kv.get(key) {
            Some(e) if e.expires_at.is_some_and(|exp| exp <= now) => {
                self.kv.remove(key);
                None
            },
            Some(e) => Some(e.value.clone()),
            None => None,
        }
    }

    fn zadd(&mut self, key: &str, score: i64, member: Vec<u8>) {
        self.zsets
            .entry(key.to_string())
            .or_default()
            .entry(score)
            .or_default()
            .push(member);
    }

    fn zrem(&mut self, key: &str, member: &[u8]) {
        if let Some(tree) = self.zsets.get_mut(key) {
            tree.retain(|_, members| {
                members.retain(|m| m != member);
                !members.is_empty()
            });
        }
    }

    fn zcard(&self, key: &str) -> usize {
        self.zsets
            .get(key)
            .map(|t| t.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn zrangebyscore(&self, key: &str, max_score: i64) -> Vec<Vec<u8>> {
        let Some(tree) = self.zsets.get(key) else {
            return Vec::new();
        };
        tree.range(..=max_score)
            .flat_map(|(_, members)| members.iter().cloned())
            .collect()
    }

    fn zremrangebyscore(&mut self, key: &str, max_score: i64) {
        if let Some(tree) = self.zsets.get_mut(key) {
            let keep_from = tree.split_off(&(max_score + 1));
            *tree = keep_from;
        }
    }
}

/// An in-memory [`Store`] implementation; never persists across process
/// restarts and is intended for tests and local development only.
pub struct MemoryStore {
    state: Mutex<State>,
    push_signal: Notify,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(State::default()),
            push_signal: Notify::new(),
        }
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u32>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let expires_at = ttl_seconds.map(|s| now_unix() + s as i64);
        state.kv.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.kv_get(key))
    }

    async fn kv_del(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.kv.remove(key);
        Ok(())
    }

    async fn list_push(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.lists.entry(key.to_string()).or_default().push_front(value);
        drop(state);
        self.push_signal.notify_waiters();
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.lists.get_mut(key).and_then(VecDeque::pop_back))
    }

    async fn list_blocking_pop(
        &self,
        keys: &[String],
        timeout_seconds: u32,
    ) -> Result<Option<PoppedEntry>, StoreError> {
        let deadline = Duration::from_secs(timeout_seconds.max(1) as u64);

        let attempt = async {
            loop {
                {
                    let mut state = self.state.lock().await;
                    for key in keys {
                        if let Some(value) = state.lists.get_mut(key).and_then(VecDeque::pop_back) {
                            return PoppedEntry {
                                key: key.clone(),
                                value,
                            };
                        }
                    }
                }
                self.push_signal.notified().await;
            }
        };

        match timeout(deadline, attempt).await {
            Ok(popped) => Ok(Some(popped)),
            Err(_) => Ok(None),
        }
    }

    async fn list_peek_head(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.lists.get(key).and_then(|l| l.back().cloned()))
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.lists.get(key).map(VecDeque::len).unwrap_or(0) as u64)
    }

    async fn timer_add(
        &self,
        timer_key: &str,
        registry_key: &str,
        registry_member: &str,
        fire_at_unix: i64,
        member: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.zadd(timer_key, fire_at_unix, member);
        state
            .registry
            .entry(registry_key.to_string())
            .or_default()
            .insert(registry_member.to_string());
        Ok(())
    }

    async fn timer_remove(&self, timer_key: &str, member: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.zrem(timer_key, member);
        Ok(())
    }

    async fn timer_registry_members(&self, registry_key: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .registry
            .get(registry_key)
            .map(|s| s.iter().cloned().collect::<HashSet<_>>())
            .unwrap_or_default()
            .into_iter()
            .collect())
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
        let mut state = self.state.lock().await;
        let due = state.zrangebyscore(timer_key, now_unix);
        if due.is_empty() {
            return Ok(PumpCounts::default());
        }

        let mut counts = PumpCounts::default();
        for member in &due {
            match ReadyEntry::decode(member) {
                Ok(entry) if entry.remaining_tries > 0 => {
                    state
                        .lists
                        .entry(ready_key.to_string())
                        .or_default()
                        .push_front(member.clone());
                    counts.to_ready += 1;
                },
                Ok(entry) => {
                    state
                        .lists
                        .entry(dead_letter_key.to_string())
                        .or_default()
                        .push_front(entry.job_id.to_string().into_bytes());
                    counts.to_dead_letter += 1;
                },
                Err(_) => continue,
            }
        }

        state.zremrangebyscore(timer_key, now_unix);

        if state.zcard(timer_key) == 0 {
            if let Some(members) = state.registry.get_mut(registry_key) {
                members.remove(registry_member);
            }
        }

        drop(state);
        self.push_signal.notify_waiters();
        Ok(counts)
    }

    async fn dead_letter_respawn(
        &self,
        dead_letter_key: &str,
        ready_key: &str,
        pool_key_prefix: &str,
        limit: u32,
        ttl_seconds: u32,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut count = 0u64;
        for _ in 0..limit {
            let Some(id) = state.lists.get_mut(dead_letter_key).and_then(VecDeque::pop_back) else {
                break;
            };
            let id_str = String::from_utf8_lossy(&id).into_owned();
            let job_id: crate::id::JobId = match id_str.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            let entry = ReadyEntry {
                remaining_tries: 1,
                job_id,
            }
            .encode();
            state
                .lists
                .entry(ready_key.to_string())
                .or_default()
                .push_front(entry.to_vec());

            let pool_key = format!("{pool_key_prefix}{id_str}");
            if let Some(e) = state.kv.get_mut(&pool_key) {
                e.expires_at = if ttl_seconds == 0 {
                    None
                } else {
                    Some(now_unix() + ttl_seconds as i64)
                };
            }
            count += 1;
        }
        drop(state);
        if count > 0 {
            self.push_signal.notify_waiters();
        }
        Ok(count)
    }

    async fn dead_letter_delete(
        &self,
        dead_letter_key: &str,
        pool_key_prefix: &str,
        limit: u32,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut count = 0u64;
        for _ in 0..limit {
            let Some(id) = state.lists.get_mut(dead_letter_key).and_then(VecDeque::pop_back) else {
                break;
            };
            let id_str = String::from_utf8_lossy(&id).into_owned();
            state.kv.remove(&format!("{pool_key_prefix}{id_str}"));
            count += 1;
        }
        Ok(count)
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
        let mut state = self.state.lock().await;
        let mut processed = 0u64;

        for _ in 0..batch {
            let Some(entry) = state.lists.get_mut(ready_key).and_then(VecDeque::pop_back) else {
                break;
            };
            if let Ok(decoded) = ReadyEntry::decode(&entry) {
                state
                    .kv
                    .remove(&format!("{pool_key_prefix}{}", decoded.job_id));
            }
            processed += 1;
        }

        for _ in 0..batch {
            let Some(id) = state.lists.get_mut(dead_letter_key).and_then(VecDeque::pop_back) else {
                break;
            };
            let id_str = String::from_utf8_lossy(&id).into_owned();
            state.kv.remove(&format!("{pool_key_prefix}{id_str}"));
            processed += 1;
        }

        let timer_members: Vec<Vec<u8>> = state
            .zsets
            .get(timer_key)
            .into_iter()
            .flat_map(|tree| tree.values().flatten().cloned())
            .take(batch as usize)
            .collect();
        for member in timer_members {
            state.zrem(timer_key, &member);
            if let Ok(decoded) = ReadyEntry::decode(&member) {
                state
                    .kv
                    .remove(&format!("{pool_key_prefix}{}", decoded.job_id));
            }
            processed += 1;
        }

        if state.lists.get(ready_key).map(VecDeque::is_empty).unwrap_or(true)
            && state
                .lists
                .get(dead_letter_key)
                .map(VecDeque::is_empty)
                .unwrap_or(true)
            && state.zcard(timer_key) == 0
        {
            if let Some(members) = state.registry.get_mut(registry_key) {
                members.remove(registry_member);
            }
        }

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kv_roundtrip() {
        let store = MemoryStore::new();
        store.kv_set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.kv_get("k").await.unwrap(), Some(b"v".to_vec()));
        store.kv_del("k").await.unwrap();
        assert_eq!(store.kv_get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_fifo() {
        let store = MemoryStore::new();
        store.list_push("q", b"a".to_vec()).await.unwrap();
        store.list_push("q", b"b".to_vec()).await.unwrap();
        assert_eq!(store.list_pop("q").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.list_pop("q").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.list_pop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn kv_expires() {
        let store = MemoryStore::new();
        store.kv_set("k", b"v".to_vec(), Some(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.kv_get("k").await.unwrap(), None);
    }
}
