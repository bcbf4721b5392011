use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// The maximum permitted body size (§3 I4, §6.1 413).
pub const MAX_BODY_BYTES: usize = 65535;

/// The maximum permitted `tries` value, matching the 16-bit `remaining_tries`
/// packed into [`crate::codec::ReadyEntry`] and timer-event payloads.
pub const MAX_TRIES: u16 = u16::MAX;

/// A unit of work: an opaque body plus the lifecycle metadata that governs
/// how many times, and over what window, it may be delivered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub namespace: String,
    pub queue: String,
    pub body: Vec<u8>,
    pub ttl_seconds: u32,
    pub delay_seconds: u32,
    pub tries: u16,
    pub created_at: i64,
}
