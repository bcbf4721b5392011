//! The public facade (§4.6): composes [`job_pool`], [`ready_queue`],
//! [`timer`], and [`dead_letter`] into the operations the HTTP layer (and any
//! other embedder) calls directly.

pub mod dead_letter;
pub mod job;
pub mod job_pool;
pub mod pumper;
pub mod queue_name;
pub mod ready_queue;
pub mod timer;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::PoolRecord;
use crate::error::EngineError;
use crate::id::JobId;
use crate::store::Store;

pub use job::{Job, MAX_BODY_BYTES, MAX_TRIES};
pub use queue_name::QueueName;

/// Clock-skew margin folded into a delayed publish's effective TTL — see
/// SPEC_FULL.md §9's "publish-path grace" resolution.
const PUBLISH_GRACE_SECONDS: u32 = 5;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// The queue engine, generic over its backing [`Store`].
///
/// Cheap to clone-by-reference: callers share one `Arc<Engine<S>>` (or just
/// `Arc<S>`, reconstructing an `Engine` per call) across the HTTP handlers and
/// the Pumper task.
pub struct Engine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Engine { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Accepts a new job (§4.6 Publish). Rejects bodies over
    /// [`MAX_BODY_BYTES`], `tries == 0`, and a finite `ttl_seconds` shorter
    /// than `delay_seconds` (I3) as [`EngineError::InvalidArgument`].
    pub async fn publish(
        &self,
        namespace: &str,
        queue: &str,
        body: Vec<u8>,
        ttl_seconds: u32,
        delay_seconds: u32,
        tries: u16,
    ) -> Result<JobId, EngineError> {
        if body.len() > MAX_BODY_BYTES {
            return Err(EngineError::invalid(format!(
                "body of {} bytes exceeds the {} byte limit",
                body.len(),
                MAX_BODY_BYTES
            )));
        }
        if tries == 0 {
            return Err(EngineError::invalid("tries must be at least 1"));
        }
        if ttl_seconds != 0 && ttl_seconds < delay_seconds {
            return Err(EngineError::invalid(
                "ttl_seconds must be 0 (infinite) or >= delay_seconds",
            ));
        }

        let qn = QueueName::new(namespace, queue)?;
        let job_id = JobId::new();
        let created_at = now_unix();

        let ttl_effective = effective_ttl(ttl_seconds, delay_seconds);

        let record = PoolRecord {
            tries,
            delay_seconds,
            ttl_seconds,
            created_at,
            body,
        };
        job_pool::add(&*self.store, &qn, job_id, &record, ttl_effective).await?;

        if delay_seconds == 0 {
            let entry = crate::codec::ReadyEntry {
                remaining_tries: tries,
                job_id,
            };
            if let Err(error) = ready_queue::push(&*self.store, &qn, entry).await {
                let _ = job_pool::delete(&*self.store, &qn, job_id).await;
                return Err(error);
            }
        } else if let Err(error) =
            timer::add(&*self.store, &qn, job_id, delay_seconds, tries, created_at).await
        {
            let _ = job_pool::delete(&*self.store, &qn, job_id).await;
            return Err(error);
        }

        Ok(job_id)
    }

    /// Claims the next job from a single queue (§4.6 Consume).
    pub async fn consume(
        &self,
        namespace: &str,
        queue: &str,
        ttr_seconds: u32,
        timeout_seconds: u32,
    ) -> Result<Option<Job>, EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        self.consume_from(&[qn], ttr_seconds, timeout_seconds).await
    }

    /// Claims the next job from whichever of `queues` serves one first
    /// (§4.6 ConsumeMulti). `timeout_seconds == 0` is only valid with a
    /// single queue (I: non-blocking poll has no way to pick a winner across
    /// queues without blocking).
    pub async fn consume_multi(
        &self,
        namespace: &str,
        queues: &[String],
        ttr_seconds: u32,
        timeout_seconds: u32,
    ) -> Result<Option<Job>, EngineError> {
        if queues.is_empty() {
            return Err(EngineError::invalid("queues must not be empty"));
        }
        if queues.len() > 1 && timeout_seconds == 0 {
            return Err(EngineError::invalid(
                "timeout_seconds must be > 0 when consuming from more than one queue",
            ));
        }

        let qns = queues
            .iter()
            .map(|q| QueueName::new(namespace, q.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        self.consume_from(&qns, ttr_seconds, timeout_seconds).await
    }

    /// Shared loop behind [`Self::consume`] and [`Self::consume_multi`]:
    /// poll, then resolve the popped id against the JobPool. A miss means the
    /// id is a "ghost" — already deleted or expired (§7) — so with time
    /// remaining the loop keeps polling instead of surfacing a spurious
    /// `NotFound`.
    async fn consume_from(
        &self,
        queues: &[QueueName],
        ttr_seconds: u32,
        timeout_seconds: u32,
    ) -> Result<Option<Job>, EngineError> {
        let deadline = now_unix() + timeout_seconds as i64;

        loop {
            let remaining = if timeout_seconds == 0 {
                0
            } else {
                let left = deadline - now_unix();
                if left <= 0 {
                    return Ok(None);
                }
                left as u32
            };

            let Some(polled) = ready_queue::poll(&*self.store, queues, remaining, ttr_seconds).await?
            else {
                return Ok(None);
            };

            match job_pool::get(&*self.store, &polled.queue, polled.job_id).await? {
                Some(job) => return Ok(Some(job)),
                None => {
                    tracing::debug!(
                        job_id = %polled.job_id,
                        "consumed a ghost job id with no surviving body, continuing"
                    );
                    if timeout_seconds == 0 {
                        return Ok(None);
                    }
                },
            }
        }
    }

    /// Removes a job's body and best-effort cancels its pending timer event
    /// (§4.6 Delete). Idempotent: deleting an already-gone or unknown id is
    /// not an error.
    pub async fn delete(&self, namespace: &str, queue: &str, job_id: JobId) -> Result<(), EngineError> {
        let qn = QueueName::new(namespace, queue)?;

        if let Some(job) = job_pool::get(&*self.store, &qn, job_id).await? {
            timer::remove(&*self.store, &qn, job_id, job.tries).await?;
        }
        job_pool::delete(&*self.store, &qn, job_id).await
    }

    /// Reads a job's body without claiming it (§4.6 Peek). With `job_id ==
    /// None`, peeks the head of the ready queue; a hit there whose body has
    /// since vanished (a ghost, §7) is reported as `NotFound` rather than
    /// silently advancing to the next entry, since peek must not mutate
    /// state.
    pub async fn peek(
        &self,
        namespace: &str,
        queue: &str,
        job_id: Option<JobId>,
    ) -> Result<Job, EngineError> {
        let qn = QueueName::new(namespace, queue)?;

        let id = match job_id {
            Some(id) => id,
            None => ready_queue::peek(&*self.store, &qn)
                .await?
                .ok_or(EngineError::NotFound)?,
        };

        job_pool::get(&*self.store, &qn, id).await?.ok_or(EngineError::NotFound)
    }

    /// Reports the ready-queue depth (§4.6 Size).
    pub async fn size(&self, namespace: &str, queue: &str) -> Result<u64, EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        ready_queue::size(&*self.store, &qn).await
    }

    /// Reports dead-letter depth and head id (§4.6 PeekDeadLetter).
    pub async fn peek_dead_letter(
        &self,
        namespace: &str,
        queue: &str,
    ) -> Result<(u64, Option<JobId>), EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        dead_letter::peek(&*self.store, &qn).await
    }

    /// Moves up to `limit` dead-letter entries back to the ready queue with
    /// a single fresh try and a refreshed TTL (§4.6 RespawnDeadLetter).
    pub async fn respawn_dead_letter(
        &self,
        namespace: &str,
        queue: &str,
        limit: u32,
        ttl_seconds: u32,
    ) -> Result<u64, EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        dead_letter::respawn(&*self.store, &qn, limit, ttl_seconds).await
    }

    /// Discards up to `limit` dead-letter entries and their bodies (§4.6
    /// DeleteDeadLetter).
    pub async fn delete_dead_letter(
        &self,
        namespace: &str,
        queue: &str,
        limit: u32,
    ) -> Result<u64, EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        dead_letter::delete(&*self.store, &qn, limit).await
    }

    /// Erases a queue's ready list, dead letter, timer events, and every
    /// referenced body (§4.6 Destroy). Returns the number of bodies deleted.
    pub async fn destroy(&self, namespace: &str, queue: &str) -> Result<u64, EngineError> {
        let qn = QueueName::new(namespace, queue)?;
        ready_queue::destroy(&*self.store, &qn).await
    }
}

impl<S: Store> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Engine {
            store: Arc::clone(&self.store),
        }
    }
}

fn effective_ttl(ttl_seconds: u32, delay_seconds: u32) -> u32 {
    if delay_seconds == 0 || ttl_seconds == 0 {
        return ttl_seconds;
    }
    let floor = delay_seconds.saturating_add(PUBLISH_GRACE_SECONDS);
    ttl_seconds.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> Engine<MemoryStore> {
        Engine::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn publish_then_consume_roundtrips_the_body() {
        let engine = engine();
        let id = engine
            .publish("ns", "q", b"hello".to_vec(), 60, 0, 3)
            .await
            .unwrap();

        let job = engine.consume("ns", "q", 30, 0).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.body, b"hello");
        assert_eq!(job.tries, 3);
    }

    #[tokio::test]
    async fn consume_on_empty_queue_returns_none_immediately() {
        let engine = engine();
        assert!(engine.consume("ns", "q", 30, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_rejects_oversized_body() {
        let engine = engine();
        let body = vec![0u8; MAX_BODY_BYTES + 1];
        let err = engine.publish("ns", "q", body, 60, 0, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn publish_rejects_zero_tries() {
        let engine = engine();
        let err = engine
            .publish("ns", "q", b"x".to_vec(), 60, 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn publish_rejects_ttl_shorter_than_delay() {
        let engine = engine();
        let err = engine
            .publish("ns", "q", b"x".to_vec(), 5, 10, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_removes_a_job_from_the_ready_queue() {
        let engine = engine();
        let id = engine
            .publish("ns", "q", b"hello".to_vec(), 60, 0, 1)
            .await
            .unwrap();

        engine.delete("ns", "q", id).await.unwrap();

        assert_eq!(engine.size("ns", "q").await.unwrap(), 1);
        let job = engine.consume("ns", "q", 30, 0).await.unwrap().unwrap();
        assert_eq!(job.id, id);

        assert!(matches!(
            engine.peek("ns", "q", Some(id)).await.unwrap_err(),
            EngineError::NotFound
        ));
    }

    #[tokio::test]
    async fn peek_reports_not_found_for_an_unknown_id() {
        let engine = engine();
        let err = engine
            .peek("ns", "q", Some(JobId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound));
    }

    #[tokio::test]
    async fn consume_multi_rejects_zero_timeout_across_many_queues() {
        let engine = engine();
        let err = engine
            .consume_multi("ns", &["a".to_string(), "b".to_string()], 30, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn consume_multi_serves_from_whichever_queue_has_a_job() {
        let engine = engine();
        let id = engine
            .publish("ns", "b", b"hi".to_vec(), 60, 0, 1)
            .await
            .unwrap();

        let job = engine
            .consume_multi("ns", &["a".to_string(), "b".to_string()], 1, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.id, id);
    }

    #[tokio::test]
    async fn destroy_erases_ready_queue_and_bodies() {
        let engine = engine();
        engine.publish("ns", "q", b"1".to_vec(), 60, 0, 1).await.unwrap();
        engine.publish("ns", "q", b"2".to_vec(), 60, 0, 1).await.unwrap();

        let erased = engine.destroy("ns", "q").await.unwrap();
        assert_eq!(erased, 2);
        assert_eq!(engine.size("ns", "q").await.unwrap(), 0);
    }
}
