use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::data::{Headers, PreparedRequest};
use crate::error::FetchError;

/// A boxed stream type for HTTP response bodies.
///
/// The stream yields `Result<Bytes, E>` where E is the error type from the HTTP client.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Response head plus a streaming body, as returned by an [`HttpClient`].
pub struct RawResponse<E = FetchError> {
    pub status:  u16,
    pub headers: Headers,
    pub body:    BoxStream<'static, Result<Bytes, E>>,
}

impl<E> std::fmt::Debug for RawResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl<E> RawResponse<E>
where
    E: Into<FetchError> + Send + 'static,
{
    /// Convert body errors into [`FetchError`].
    pub fn into_fetch(self) -> RawResponse {
        RawResponse {
            status:  self.status,
            headers: self.headers,
            body:    Box::pin(self.body.map(|frame| frame.map_err(Into::into))),
        }
    }
}

/// Asynchronous HTTP client abstraction.
///
/// This trait provides the minimal interface needed for fetching operations.
/// Implementations handle their own redirect following, cookie storage and
/// connection reuse. A timeout in the prepared request applies to the whole
/// exchange; `None` means the caller owns cancellation.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync + 'static {
    /// Error type for HTTP operations.
    type Error: std::error::Error + Into<FetchError> + Send + 'static;

    /// Send a request and return the response head with a streaming body.
    ///
    /// # Errors
    ///
    /// Returns an error if no response head was received (DNS failure,
    /// connection error, timeout). Non-2xx statuses are not errors at this
    /// level.
    fn send(
        &self,
        request: &PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::data::Method;

    /// Production HTTP client implementation using reqwest.
    ///
    /// Clones share one connection pool.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default configuration.
        pub fn new() -> crate::error::Result<Self> {
            let client = reqwest::Client::builder().build()?;
            Ok(Self { client })
        }

        /// Client that stores cookies between requests.
        pub fn session() -> crate::error::Result<Self> {
            let client = reqwest::Client::builder().cookie_store(true).build()?;
            Ok(Self { client })
        }

        /// Wrap an already configured reqwest client.
        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn send(
            &self,
            request: &PreparedRequest,
        ) -> Result<RawResponse<Self::Error>, Self::Error> {
            let mut builder = self
                .client
                .request(method(request.method), &request.url)
                .body(request.body.clone());

            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await?;

            let mut headers = Headers::new();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    headers.insert(name.as_str(), value);
                }
            }

            Ok(RawResponse {
                status: response.status().as_u16(),
                headers,
                body: Box::pin(response.bytes_stream()),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
