//! Request/response bodies and query-string shapes for the HTTP surface (§6.1).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::engine::Job;

#[derive(Debug, Deserialize)]
pub struct PublishQuery {
    #[serde(default)]
    pub delay: u32,
    pub ttl: Option<u32>,
    pub tries: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub msg: &'static str,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsumeQuery {
    #[serde(default = "default_ttr")]
    pub ttr: u32,
    #[serde(default)]
    pub timeout: u32,
}

fn default_ttr() -> u32 {
    60
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub job_id: String,
    pub data: String,
    pub ttl: u32,
    pub elapsed_ms: u64,
    pub queue: String,
    pub namespace: String,
}

impl ConsumeResponse {
    pub fn from_job(job: Job, elapsed_ms: u64) -> Self {
        ConsumeResponse {
            job_id: job.id.to_string(),
            data: BASE64.encode(&job.body),
            ttl: job.ttl_seconds,
            elapsed_ms,
            queue: job.queue,
            namespace: job.namespace,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PeekResponse {
    pub job_id: String,
    pub data: String,
    pub ttl: u32,
    pub queue: String,
    pub namespace: String,
}

impl From<Job> for PeekResponse {
    fn from(job: Job) -> Self {
        PeekResponse {
            job_id: job.id.to_string(),
            data: BASE64.encode(&job.body),
            ttl: job.ttl_seconds,
            queue: job.queue,
            namespace: job.namespace,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SizeResponse {
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct DeadLetterPeekResponse {
    pub deadletter_size: u64,
    pub deadletter_head: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespawnQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub ttl: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDeadLetterQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
