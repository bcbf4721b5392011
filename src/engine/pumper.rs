//! The single-writer background mover from Timer to Ready/DeadLetter (§4.4).
//!
//! Grounded in the teacher's accept-loop shutdown pattern (`main.rs`): a
//! `CancellationToken`-guarded `tokio::select!` loop, spawned once at
//! startup and raced against the process's shutdown signal (§9c).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::engine::queue_name::QueueName;
use crate::engine::timer::REGISTRY_KEY;
use crate::store::Store;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Spawns the pump loop as a background task, ticking every `interval_ms`.
/// Returns the task's `JoinHandle`; dropping the returned `CancellationToken`
/// guard is not sufficient to stop it — callers cancel the shared token.
pub fn spawn<S: Store>(
    store: Arc<S>,
    interval_ms: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => tick(&*store).await,
                _ = cancel.cancelled() => {
                    debug!("pumper shutting down");
                    return;
                },
            }
        }
    })
}

#[instrument(skip(store))]
async fn tick<S: Store>(store: &S) {
    let now = now_unix();

    let members = match store.timer_registry_members(REGISTRY_KEY).await {
        Ok(members) => members,
        Err(error) => {
            warn!(%error, "failed to list timer registry; retrying next tick");
            return;
        },
    };

    for member in members {
        let Some((namespace, queue)) = member.split_once('/') else {
            warn!(member, "malformed timer registry member, skipping");
            continue;
        };
        let Ok(qn) = QueueName::new(namespace, queue) else {
            warn!(member, "malformed timer registry member, skipping");
            continue;
        };

        match store
            .due_and_route(
                &qn.timer_key(),
                &qn.ready_key(),
                &qn.dead_letter_key(),
                REGISTRY_KEY,
                &member,
                now,
            )
            .await
        {
            Ok(counts) if counts.to_ready > 0 || counts.to_dead_letter > 0 => {
                debug!(
                    namespace,
                    queue,
                    to_ready = counts.to_ready,
                    to_dead_letter = counts.to_dead_letter,
                    "pumped due timer events"
                );
            },
            Ok(_) => {},
            Err(error) => {
                warn!(%error, namespace, queue, "pump step failed; will retry next tick");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ReadyEntry;
    use crate::id::JobId;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn moves_due_event_to_ready() {
        let store = MemoryStore::new();
        let qn = QueueName::new("ns", "q").unwrap();
        let job_id = JobId::new();

        crate::engine::timer::add(&store, &qn, job_id, 0, 3, now_unix() - 1)
            .await
            .unwrap();

        tick(&store).await;

        let head = store.list_peek_head(&qn.ready_key()).await.unwrap().unwrap();
        let entry = ReadyEntry::decode(&head).unwrap();
        assert_eq!(entry.job_id, job_id);
        assert_eq!(entry.remaining_tries, 3);
    }

    #[tokio::test]
    async fn routes_exhausted_tries_to_dead_letter() {
        let store = MemoryStore::new();
        let qn = QueueName::new("ns", "q").unwrap();
        let job_id = JobId::new();

        crate::engine::timer::add(&store, &qn, job_id, 0, 0, now_unix() - 1)
            .await
            .unwrap();

        tick(&store).await;

        let head = store
            .list_peek_head(&qn.dead_letter_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(String::from_utf8(head).unwrap(), job_id.to_string());
    }

    #[tokio::test]
    async fn leaves_not_yet_due_events_alone() {
        let store = MemoryStore::new();
        let qn = QueueName::new("ns", "q").unwrap();
        let job_id = JobId::new();

        crate::engine::timer::add(&store, &qn, job_id, 3600, 1, now_unix())
            .await
            .unwrap();

        tick(&store).await;

        assert!(store.list_peek_head(&qn.ready_key()).await.unwrap().is_none());
    }
}
