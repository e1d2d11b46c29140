//! Pluggable JSON encoding.

use std::fmt;

use serde_json::Value;

use crate::error::Result;

/// Encoder/decoder pair used for JSON request and response bodies.
///
/// Values pass through [`serde_json::Value`] so implementations stay object
/// safe and can be swapped at runtime through
/// [`FetchConfig::json_codec`](crate::FetchConfig::json_codec).
pub trait JsonCodec: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// Default codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
