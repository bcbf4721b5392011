//! Per-queue FIFO of [`ReadyEntry`] handles (§4.2). Push appends at one end;
//! Poll removes from the other, so first-published is first-served.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::ReadyEntry;
use crate::error::EngineError;
use crate::id::JobId;
use crate::store::Store;

use super::queue_name::QueueName;
use super::timer;

/// Batch size for the scanning `Destroy` script (§4.2).
const DESTROY_BATCH: u32 = 100;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

pub async fn push<S: Store>(
    store: &S,
    qn: &QueueName,
    entry: ReadyEntry,
) -> Result<(), EngineError> {
    store
        .list_push(&qn.ready_key(), entry.encode().to_vec())
        .await
        .map_err(EngineError::from)
}

/// The outcome of a successful [`poll`]: which queue served the job, and
/// the entry that was popped (before the post-pop decrement described below).
pub struct Polled {
    pub queue: QueueName,
    pub job_id: JobId,
}

/// Polls `queues` for a ready job, waiting up to `timeout_seconds` (§4.2).
///
/// `timeout_seconds == 0` requires exactly one queue (enforced by callers —
/// the HTTP layer rejects the multi-queue, zero-timeout combination before
/// this is ever called). On success, registers a TTR timer event for
/// `(remaining_tries - 1, job_id)` — a second, non-atomic store round trip
/// accepted per §9's "non-atomic pop-then-schedule" trade-off.
pub async fn poll<S: Store>(
    store: &S,
    queues: &[QueueName],
    timeout_seconds: u32,
    ttr_seconds: u32,
) -> Result<Option<Polled>, EngineError> {
    let popped = if timeout_seconds == 0 {
        let qn = &queues[0];
        store
            .list_pop(&qn.ready_key())
            .await?
            .map(|bytes| (qn.clone(), bytes))
    } else {
        let keys: Vec<String> = queues.iter().map(QueueName::ready_key).collect();
        store
            .list_blocking_pop(&keys, timeout_seconds)
            .await?
            .map(|popped| {
                let qn = queues
                    .iter()
                    .find(|q| q.ready_key() == popped.key)
                    .cloned()
                    .expect("store returned a key we didn't ask it to pop from");
                (qn, popped.value)
            })
    };

    let Some((qn, bytes)) = popped else {
        return Ok(None);
    };

    let entry = ReadyEntry::decode(&bytes)?;

    if entry.remaining_tries > 0 {
        timer::add(
            store,
            &qn,
            entry.job_id,
            ttr_seconds,
            entry.remaining_tries - 1,
            now_unix(),
        )
        .await?;
    }

    Ok(Some(Polled {
        queue: qn,
        job_id: entry.job_id,
    }))
}

pub async fn peek<S: Store>(store: &S, qn: &QueueName) -> Result<Option<JobId>, EngineError> {
    let Some(bytes) = store.list_peek_head(&qn.ready_key()).await? else {
        return Ok(None);
    };
    let entry = ReadyEntry::decode(&bytes)?;
    Ok(Some(entry.job_id))
}

pub async fn size<S: Store>(store: &S, qn: &QueueName) -> Result<u64, EngineError> {
    store.list_len(&qn.ready_key()).await.map_err(EngineError::from)
}

/// Erases the ready queue, dead letter, and timer for `qn`, deleting every
/// referenced body, in batches of [`DESTROY_BATCH`]. Resilient to the
/// destroy script being evicted from the store's script cache: `redis::Script`
/// already folds the reload-and-retry into `invoke_async` (§7, §9).
pub async fn destroy<S: Store>(store: &S, qn: &QueueName) -> Result<u64, EngineError> {
    let pool_prefix = format!("j/{}/{}/", qn.namespace, qn.queue);
    let registry_member = qn.to_string();

    let mut total = 0u64;
    loop {
        let processed = store
            .destroy_batch(
                &qn.ready_key(),
                &qn.dead_letter_key(),
                &qn.timer_key(),
                timer::REGISTRY_KEY,
                &registry_member,
                &pool_prefix,
                DESTROY_BATCH,
            )
            .await?;
        total += processed;
        if processed == 0 {
            break;
        }
    }
    Ok(total)
}
