//! Payload codec
//!
//! Session values are stored as JSON. The map is ordered, so the same payload
//! always encodes to the same bytes.

use crate::error::{SessionError, SessionResult};
use crate::models::SessionValues;

/// Encodes and decodes session payloads, enforcing an optional size cap
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec {
    max_length: Option<usize>,
}

impl PayloadCodec {
    /// Create a codec; `None` means no size limit
    pub fn new(max_length: Option<usize>) -> Self {
        Self { max_length }
    }

    /// Maximum encoded size in bytes
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Serialize a payload, failing with `TooLarge` past the size cap
    pub fn encode(&self, values: &SessionValues) -> SessionResult<Vec<u8>> {
        let data = serde_json::to_vec(values).map_err(SessionError::Encode)?;

        if let Some(max) = self.max_length {
            if data.len() > max {
                return Err(SessionError::TooLarge {
                    size: data.len(),
                    max,
                });
            }
        }

        Ok(data)
    }

    /// Deserialize a payload previously produced by [`PayloadCodec::encode`]
    pub fn decode(&self, data: &[u8]) -> SessionResult<SessionValues> {
        serde_json::from_slice(data).map_err(SessionError::Corrupt)
    }
}
