//! The ordered set of pending firings (§4.3): delayed publishes and TTR
//! leases, keyed by `fire_at` unix-second score.

use crate::codec::ReadyEntry;
use crate::error::EngineError;
use crate::id::JobId;
use crate::store::Store;

use super::queue_name::QueueName;

/// Registry of `"namespace/queue"` pairs with a non-empty timer zset, so the
/// Pumper (§4.4) knows which per-queue timer keys to scan without having to
/// be told about every queue up front.
pub const REGISTRY_KEY: &str = "timer-registry";

pub async fn add<S: Store>(
    store: &S,
    qn: &QueueName,
    job_id: JobId,
    delay_seconds: u32,
    remaining_tries: u16,
    now_unix: i64,
) -> Result<(), EngineError> {
    let member = ReadyEntry {
        remaining_tries,
        job_id,
    }
    .encode();

    let registry_member = qn.to_string();
    let fire_at = now_unix + delay_seconds as i64;

    store
        .timer_add(
            &qn.timer_key(),
            REGISTRY_KEY,
            &registry_member,
            fire_at,
            member.to_vec(),
        )
        .await
        .map_err(EngineError::from)
}

/// Best-effort cancellation of a pending timer event for `job_id`, assuming
/// it is still scheduled at its original `tries` count (i.e. it has not yet
/// been consumed and rescheduled at a lower `remaining_tries`). If the event
/// has already moved — fired, consumed, or rescheduled — this is a harmless
/// no-op; the consumer that eventually reaches a deleted body's ghost id
/// recovers locally per §7.
pub async fn remove<S: Store>(
    store: &S,
    qn: &QueueName,
    job_id: JobId,
    tries: u16,
) -> Result<(), EngineError> {
    let member = ReadyEntry {
        remaining_tries: tries,
        job_id,
    }
    .encode();
    store
        .timer_remove(&qn.timer_key(), &member)
        .await
        .map_err(EngineError::from)
}
