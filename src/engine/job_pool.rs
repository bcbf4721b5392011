//! Content-addressed byte store: `(namespace, queue, jobID) -> body` with
//! per-key TTL (§4.1).

use crate::codec::PoolRecord;
use crate::error::EngineError;
use crate::id::JobId;
use crate::store::Store;

use super::job::Job;
use super::queue_name::QueueName;

pub async fn add<S: Store>(
    store: &S,
    qn: &QueueName,
    job_id: JobId,
    record: &PoolRecord,
    ttl_seconds_effective: u32,
) -> Result<(), EngineError> {
    let ttl = if ttl_seconds_effective == 0 {
        None
    } else {
        Some(ttl_seconds_effective)
    };
    store
        .kv_set(&qn.pool_key(&job_id), record.encode().to_vec(), ttl)
        .await
        .map_err(EngineError::from)
}

/// Reads and decodes the record, if present. A decode failure is treated as
/// `Internal` (via `EngineError::Codec`) — it indicates store corruption, not
/// an expected absence.
pub async fn get<S: Store>(
    store: &S,
    qn: &QueueName,
    job_id: JobId,
) -> Result<Option<Job>, EngineError> {
    let Some(bytes) = store.kv_get(&qn.pool_key(&job_id)).await? else {
        return Ok(None);
    };
    let record = PoolRecord::decode(&bytes)?;
    Ok(Some(Job {
        id: job_id,
        namespace: qn.namespace.clone(),
        queue: qn.queue.clone(),
        body: record.body,
        ttl_seconds: record.ttl_seconds,
        delay_seconds: record.delay_seconds,
        tries: record.tries,
        created_at: record.created_at,
    }))
}

pub async fn delete<S: Store>(
    store: &S,
    qn: &QueueName,
    job_id: JobId,
) -> Result<(), EngineError> {
    store
        .kv_del(&qn.pool_key(&job_id))
        .await
        .map_err(EngineError::from)
}
