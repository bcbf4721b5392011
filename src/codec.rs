//! Binary packing for values stored as opaque blobs inside the backing store
//! (ready-queue list entries and timer-event payloads).
//!
//! Grounded in the teacher's `wire::encoder`/`wire::decoder` pair: a small
//! `bytes`-based packer/unpacker with its own error enum, rather than reaching
//! for a generic serializer for a handful of fixed-width fields.

use std::{error, fmt};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::id::JobId;

/// `u16 tries ∥ u16 len(jobID) ∥ jobID_bytes`, little-endian (§6.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadyEntry {
    pub remaining_tries: u16,
    pub job_id: JobId,
}

#[derive(Debug)]
pub enum CodecError {
    Truncated,
    TrailingBytes,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated => write!(f, "buffer too short to decode a ReadyEntry"),
            CodecError::TrailingBytes => write!(f, "buffer has unexpected trailing bytes"),
        }
    }
}

impl error::Error for CodecError {}

impl ReadyEntry {
    /// Encodes as `u16 tries ∥ u16 len(id) ∥ id_bytes`.
    pub fn encode(&self) -> Bytes {
        let id_str = self.job_id.to_string();
        let id_bytes = id_str.as_bytes();

        let mut buf = BytesMut::with_capacity(2 + 2 + id_bytes.len());
        buf.put_u16_le(self.remaining_tries);
        buf.put_u16_le(id_bytes.len() as u16);
        buf.put_slice(id_bytes);
        buf.freeze()
    }

    pub fn decode(mut src: &[u8]) -> Result<Self, CodecError> {
        if src.len() < 4 {
            return Err(CodecError::Truncated);
        }
        let remaining_tries = src.get_u16_le();
        let id_len = src.get_u16_le() as usize;

        if src.len() < id_len {
            return Err(CodecError::Truncated);
        }
        let (id_bytes, rest) = src.split_at(id_len);
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes);
        }

        let id_str = std::str::from_utf8(id_bytes).map_err(|_| CodecError::Truncated)?;
        let job_id: JobId = id_str.parse().map_err(|_| CodecError::Truncated)?;

        Ok(ReadyEntry {
            remaining_tries,
            job_id,
        })
    }
}

/// The value stored in the JobPool under `j/{ns}/{queue}/{jobID}` (§4.1).
///
/// `namespace` and `queue` are not duplicated here — the caller always has
/// them from the key it looked the record up by.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolRecord {
    pub tries: u16,
    pub delay_seconds: u32,
    pub ttl_seconds: u32,
    pub created_at: i64,
    pub body: Vec<u8>,
}

impl PoolRecord {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + 4 + 4 + 8 + 4 + self.body.len());
        buf.put_u16_le(self.tries);
        buf.put_u32_le(self.delay_seconds);
        buf.put_u32_le(self.ttl_seconds);
        buf.put_i64_le(self.created_at);
        buf.put_u32_le(self.body.len() as u32);
        buf.put_slice(&self.body);
        buf.freeze()
    }

    pub fn decode(mut src: &[u8]) -> Result<Self, CodecError> {
        if src.len() < 22 {
            return Err(CodecError::Truncated);
        }
        let tries = src.get_u16_le();
        let delay_seconds = src.get_u32_le();
        let ttl_seconds = src.get_u32_le();
        let created_at = src.get_i64_le();
        let body_len = src.get_u32_le() as usize;

        if src.len() != body_len {
            return if src.len() < body_len {
                Err(CodecError::Truncated)
            } else {
                Err(CodecError::TrailingBytes)
            };
        }

        Ok(PoolRecord {
            tries,
            delay_seconds,
            ttl_seconds,
            created_at,
            body: src.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_record_roundtrips() {
        let record = PoolRecord {
            tries: 3,
            delay_seconds: 5,
            ttl_seconds: 60,
            created_at: 1_700_000_000,
            body: b"hello world".to_vec(),
        };
        let encoded = record.encode();
        let decoded = PoolRecord::decode(&encoded).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn pool_record_roundtrips_empty_body() {
        let record = PoolRecord {
            tries: 1,
            delay_seconds: 0,
            ttl_seconds: 0,
            created_at: 0,
            body: Vec::new(),
        };
        let encoded = record.encode();
        assert_eq!(record, PoolRecord::decode(&encoded).unwrap());
    }

    #[test]
    fn roundtrips() {
        let entry = ReadyEntry {
            remaining_tries: 7,
            job_id: JobId::new(),
        };
        let encoded = entry.encode();
        let decoded = ReadyEntry::decode(&encoded).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(matches!(
            ReadyEntry::decode(&[1, 2]),
            Err(CodecError::Truncated)
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let entry = ReadyEntry {
            remaining_tries: 1,
            job_id: JobId::new(),
        };
        let mut encoded = entry.encode().to_vec();
        encoded.push(0xFF);
        assert!(matches!(
            ReadyEntry::decode(&encoded),
            Err(CodecError::TrailingBytes)
        ));
    }
}
