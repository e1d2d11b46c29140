use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::data::codec::{JsonCodec, SerdeJsonCodec};
use crate::data::request::Headers;
use crate::error::Result;

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status:  u16,
    headers: Headers,
    body:    Bytes,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body with the default JSON codec.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.json_with(&SerdeJsonCodec)
    }

    pub fn json_with<T: DeserializeOwned>(&self, codec: &dyn JsonCodec) -> Result<T> {
        let value = codec.decode(&self.body)?;
        Ok(serde_json::from_value(value)?)
    }
}
