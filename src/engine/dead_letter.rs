//! Per-queue FIFO of exhausted job ids (§4.5).

use crate::error::EngineError;
use crate::id::JobId;
use crate::store::Store;

use super::queue_name::QueueName;

pub async fn peek<S: Store>(
    store: &S,
    qn: &QueueName,
) -> Result<(u64, Option<JobId>), EngineError> {
    let size = store.list_len(&qn.dead_letter_key()).await?;
    let head = match store.list_peek_head(&qn.dead_letter_key()).await? {
        Some(bytes) => Some(parse_id(&bytes)?),
        None => None,
    };
    Ok((size, head))
}

/// Transactionally pops up to `limit` ids from the head and re-publishes
/// each to the tail of the ready queue with `remaining_tries = 1`, refreshing
/// the body's TTL to `ttl_seconds` (§4.5 Respawn).
pub async fn respawn<S: Store>(
    store: &S,
    qn: &QueueName,
    limit: u32,
    ttl_seconds: u32,
) -> Result<u64, EngineError> {
    let pool_prefix = format!("j/{}/{}/", qn.namespace, qn.queue);
    store
        .dead_letter_respawn(&qn.dead_letter_key(), &qn.ready_key(), &pool_prefix, limit, ttl_seconds)
        .await
        .map_err(EngineError::from)
}

/// Pops and discards up to `limit` ids, deleting their bodies (§4.5 Delete).
pub async fn delete<S: Store>(store: &S, qn: &QueueName, limit: u32) -> Result<u64, EngineError> {
    let pool_prefix = format!("j/{}/{}/", qn.namespace, qn.queue);
    store
        .dead_letter_delete(&qn.dead_letter_key(), &pool_prefix, limit)
        .await
        .map_err(EngineError::from)
}

fn parse_id(bytes: &[u8]) -> Result<JobId, EngineError> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| EngineError::invalid("dead-letter entry is not valid utf-8"))?;
    s.parse()
        .map_err(|_| EngineError::invalid("dead-letter entry is not a valid job id"))
}
