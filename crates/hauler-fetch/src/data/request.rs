use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::data::auth::AuthProvider;
use crate::data::codec::{JsonCodec, SerdeJsonCodec};
use crate::error::{FetchError, Result};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header map with case-insensitive names.
///
/// Names are stored lower-cased; inserting an existing name replaces its
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.inner
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.remove(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Parsed `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// How long a request may take before it is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Use the executing fetcher's configured default.
    #[default]
    Default,
    /// Abandon after the given duration.
    After(Duration),
    /// Never time out; the caller owns cancellation.
    Disabled,
}

impl TimeoutPolicy {
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            TimeoutPolicy::Default => Some(default),
            TimeoutPolicy::After(timeout) => Some(timeout),
            TimeoutPolicy::Disabled => None,
        }
    }
}

/// Reusable request template.
///
/// Every builder method consumes the template and returns a new value, so a
/// base request can be cloned and specialised without affecting other
/// holders. Cloning is cheap: the body and authentication strategy are
/// reference counted.
///
/// # Examples
///
/// ```
/// use hauler_fetch::{BearerAuth, Request};
/// use std::time::Duration;
///
/// let base = Request::new()
///     .get("https://example.com/file.bin")
///     .header("User-Agent", "hauler/0.1")
///     .timeout(Duration::from_secs(10))
///     .auth(BearerAuth::new("token"));
///
/// let ranged = base.clone().range(0, 1023).without_timeout();
/// assert_eq!(ranged.headers().get("range"), Some("bytes=0-1023"));
/// assert!(base.headers().get("range").is_none());
/// ```
#[derive(Clone)]
pub struct Request {
    method:          Option<Method>,
    url:             Option<String>,
    headers:         Headers,
    body:            Bytes,
    timeout:         TimeoutPolicy,
    auth:            Option<Arc<dyn AuthProvider>>,
    error_on_status: bool,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .field("auth", &self.auth)
            .field("error_on_status", &self.error_on_status)
            .finish()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Empty template; non-2xx answers are errors.
    pub fn new() -> Self {
        Self {
            method:          None,
            url:             None,
            headers:         Headers::new(),
            body:            Bytes::new(),
            timeout:         TimeoutPolicy::Default,
            auth:            None,
            error_on_status: true,
        }
    }

    /// Set method and URL together.
    #[must_use]
    pub fn to(mut self, method: Method, url: impl Into<String>) -> Self {
        self.method = Some(method);
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn get(self, url: impl Into<String>) -> Self {
        self.to(Method::Get, url)
    }

    #[must_use]
    pub fn post(self, url: impl Into<String>) -> Self {
        self.to(Method::Post, url)
    }

    #[must_use]
    pub fn put(self, url: impl Into<String>) -> Self {
        self.to(Method::Put, url)
    }

    #[must_use]
    pub fn patch(self, url: impl Into<String>) -> Self {
        self.to(Method::Patch, url)
    }

    #[must_use]
    pub fn delete(self, url: impl Into<String>) -> Self {
        self.to(Method::Delete, url)
    }

    #[must_use]
    pub fn head(self, url: impl Into<String>) -> Self {
        self.to(Method::Head, url)
    }

    #[must_use]
    pub fn options(self, url: impl Into<String>) -> Self {
        self.to(Method::Options, url)
    }

    /// Override the method, keeping the URL.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set a single header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set several headers at once.
    #[must_use]
    pub fn headers_from<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Encode `value` as the JSON body with the default codec.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        self.json_with(&SerdeJsonCodec, value)
    }

    /// Encode `value` as the JSON body with `codec`.
    pub fn json_with<T: Serialize + ?Sized>(
        self,
        codec: &dyn JsonCodec,
        value: &T,
    ) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        let body = codec.encode(&value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = TimeoutPolicy::After(timeout);
        self
    }

    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = TimeoutPolicy::Disabled;
        self
    }

    #[must_use]
    pub fn auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Restrict the request to the inclusive byte range `start..=end`.
    #[must_use]
    pub fn range(self, start: u64, end: u64) -> Self {
        self.header("range", format!("bytes={start}-{end}"))
    }

    /// Return non-2xx responses as-is instead of as errors.
    #[must_use]
    pub fn no_error_on_fail(mut self) -> Self {
        self.error_on_status = false;
        self
    }

    pub fn verb(&self) -> Option<Method> {
        self.method
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout
    }

    pub fn errors_on_status(&self) -> bool {
        self.error_on_status
    }

    /// Validate the template and apply authentication.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] when method or URL is missing,
    /// or whatever the authentication strategy reports.
    pub fn prepare(&self, default_timeout: Duration) -> Result<PreparedRequest> {
        let (Some(method), Some(url)) = (self.method, self.url.as_ref()) else {
            return Err(FetchError::InvalidRequest(
                "method and url are required".into(),
            ));
        };

        let mut headers = self.headers.clone();
        if let Some(auth) = &self.auth {
            auth.apply(&mut headers)?;
        }

        Ok(PreparedRequest {
            method,
            url: url.clone(),
            headers,
            body: self.body.clone(),
            timeout: self.timeout.resolve(default_timeout),
        })
    }
}

/// A validated request as handed to an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method:  Method,
    pub url:     String,
    pub headers: Headers,
    pub body:    Bytes,
    pub timeout: Option<Duration>,
}
