//! Authentication strategies applied to outgoing requests.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::data::request::Headers;
use crate::error::Result;

/// Applies credentials to the headers of an outgoing request.
pub trait AuthProvider: Send + Sync + fmt::Debug {
    fn apply(&self, headers: &mut Headers) -> Result<()>;
}

/// HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl AuthProvider for BasicAuth {
    fn apply(&self, headers: &mut Headers) -> Result<()> {
        let credentials = STANDARD.encode(format!("{}:{}", self.username, self.password));
        headers.insert("authorization", format!("Basic {credentials}"));
        Ok(())
    }
}

/// Bearer token authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerAuth {
    pub token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"***").finish()
    }
}

impl AuthProvider for BearerAuth {
    fn apply(&self, headers: &mut Headers) -> Result<()> {
        headers.insert("authorization", format!("Bearer {}", self.token));
        Ok(())
    }
}
