use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::{ChunkLedger, accepts_ranges, clamp_connections, plan_chunks};
use crate::data::{ChunkResult, FetchConfig, Method, Request, ResourceDescriptor, Response};
use crate::effects::coordinator::Coordinator;
use crate::effects::http::{BoxStream, HttpClient, RawResponse};
use crate::effects::pool::{WorkerContext, emit_tasks, panic_message, run_worker};
use crate::effects::stream::ChunkStream;
use crate::error::{FetchError, Result};

/// Executes requests and runs concurrent range fetches over an [`HttpClient`].
///
/// Clones share the client.
pub struct Fetcher<C: HttpClient> {
    client: Arc<C>,
    config: FetchConfig,
}

impl<C: HttpClient> Clone for Fetcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C: HttpClient> std::fmt::Debug for Fetcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> Fetcher<C> {
    /// Create a new fetcher with the provided HTTP client and default configuration.
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            config: FetchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Send `request` and return the response head with a streaming body.
    ///
    /// The status is not checked.
    pub async fn execute_raw(&self, request: &Request) -> Result<RawResponse> {
        let prepared = request.prepare(self.config.default_timeout)?;
        let response = self
            .client
            .send(&prepared)
            .await
            .map_err(Into::<FetchError>::into)?;
        Ok(response.into_fetch())
    }

    /// Send `request` and buffer the whole response.
    ///
    /// # Errors
    ///
    /// [`FetchError::Timeout`] when the request's timeout elapses before the
    /// body is complete, and [`FetchError::Status`] for non-2xx answers
    /// unless the request opted out with
    /// [`Request::no_error_on_fail`].
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let prepared = request.prepare(self.config.default_timeout)?;

        let exchange = async {
            let raw = self
                .client
                .send(&prepared)
                .await
                .map_err(Into::<FetchError>::into)?
                .into_fetch();
            let body = collect_body(raw.body).await?;
            Ok::<_, FetchError>(Response::new(raw.status, raw.headers, body))
        };

        let response = match prepared.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| FetchError::Timeout)??,
            None => exchange.await?,
        };

        if request.errors_on_status() && !response.is_success() {
            return Err(FetchError::Status(Box::new(response)));
        }
        Ok(response)
    }

    /// Encode `value` as the body of `request` with the configured codec.
    pub fn json_body<T: Serialize + ?Sized>(&self, request: Request, value: &T) -> Result<Request> {
        request.json_with(self.config.json.as_ref(), value)
    }

    /// Decode a response body with the configured codec.
    pub fn decode_json<T: DeserializeOwned>(&self, response: &Response) -> Result<T> {
        response.json_with(self.config.json.as_ref())
    }

    /// Ask the server for size and range support without transferring the body.
    ///
    /// Sends `request` as `HEAD` with the configured probe timeout. A missing
    /// `Content-Length` yields an unknown size, which also rules out ranged
    /// fetching.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-2xx answer is returned as
    /// [`FetchError::Probe`].
    pub async fn probe(&self, request: &Request) -> Result<ResourceDescriptor> {
        let head = request
            .clone()
            .method(Method::Head)
            .timeout(self.config.probe_timeout);

        let response = self
            .execute(&head)
            .await
            .and_then(|response| {
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(FetchError::Status(Box::new(response)))
                }
            })
            .map_err(|e| FetchError::Probe(Box::new(e)))?;

        let descriptor = match response.headers().content_length() {
            Some(size) => ResourceDescriptor {
                size:            Some(size),
                range_supported: accepts_ranges(response.headers()),
            },
            None => ResourceDescriptor {
                size:            None,
                range_supported: false,
            },
        };
        debug!(
            size = ?descriptor.size,
            range_supported = descriptor.range_supported,
            "probed resource"
        );
        Ok(descriptor)
    }

    /// Fetch the resource behind `request` over up to `connections`
    /// concurrent ranged requests.
    ///
    /// Probes first; when the server does not support ranges or the size is
    /// unknown or zero, the resource is fetched with a single request
    /// instead. Either way the returned stream yields results in completion
    /// order, each carrying the offset its payload belongs at.
    ///
    /// Cancelling `cancel` stops the fetch and closes the stream.
    ///
    /// # Errors
    ///
    /// Only the probe can fail here ([`FetchError::Probe`]), or
    /// [`FetchError::Cancelled`] if `cancel` fires while probing. Chunk
    /// failures are reported through the stream.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures_util::StreamExt;
    /// use hauler_fetch::{Fetcher, ReqwestClient, Request};
    /// use hauler_progress::{MemorySink, WriteAt};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let fetcher = Fetcher::new(ReqwestClient::new()?);
    /// let request = Request::new().get("https://example.com/large.bin");
    /// let cancel = CancellationToken::new();
    ///
    /// let (descriptor, mut chunks) = fetcher.fetch_concurrent(&cancel, &request, 4).await?;
    /// let sink = MemorySink::new(descriptor.size.unwrap_or(0) as usize);
    /// while let Some(chunk) = chunks.next().await {
    ///     let data = chunk.outcome?;
    ///     sink.write_at(&data, chunk.start)?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch_concurrent(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        connections: usize,
    ) -> Result<(ResourceDescriptor, ChunkStream)> {
        let descriptor = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            descriptor = self.probe(request) => descriptor?,
        };

        let stream = match descriptor.size {
            Some(size) if descriptor.can_split() => {
                self.fetch_pool(cancel, request, size, connections)
            }
            size => {
                info!(size = ?size, "getting as a whole unit");
                self.fetch_whole(cancel, request, size)
            }
        };
        Ok((descriptor, stream))
    }

    /// Fetch the resource with one unranged request.
    ///
    /// The stream yields exactly one result starting at offset 0: the full
    /// body, or the failure. `size`, when known, only sets the range of a
    /// failed result. Must be called within a Tokio runtime.
    pub fn fetch_whole(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        size: Option<u64>,
    ) -> ChunkStream {
        let (tx, rx) = mpsc::channel(1);
        let token = cancel.child_token();

        let fetcher = self.clone();
        let request = request.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(FetchError::Cancelled),
                outcome = AssertUnwindSafe(fetcher.execute(&request)).catch_unwind() => {
                    match outcome {
                        Ok(response) => response.map(Response::into_body),
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!(%message, "whole fetch panicked");
                            Err(FetchError::WorkerPanicked(message))
                        }
                    }
                }
            };

            let result = match outcome {
                Ok(body) => ChunkResult::success(0, body, 0),
                Err(e) => {
                    let end = size.unwrap_or(0).saturating_sub(1);
                    ChunkResult::failure(0, end, 0, e)
                }
            };
            let _ = tx.send(result).await;
        });

        ChunkStream::new(rx, token)
    }

    /// Fetch `size` bytes as concurrent ranged requests without probing.
    ///
    /// `connections` is clamped to `[1, min(max_connections, size)]`. Must be
    /// called within a Tokio runtime.
    pub fn fetch_pool(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        size: u64,
        connections: usize,
    ) -> ChunkStream {
        let token = cancel.child_token();
        let connections = clamp_connections(connections, self.config.max_connections, size);
        let plan = plan_chunks(size, connections);

        let (out_tx, out_rx) = mpsc::channel(connections * 8);
        if plan.is_empty() {
            drop(out_tx);
            return ChunkStream::new(out_rx, token);
        }
        info!(size, connections, chunks = plan.len(), "starting concurrent fetch");

        let (task_tx, task_rx) = mpsc::channel(connections * 4);
        let (inter_tx, inter_rx) = mpsc::channel(connections * 2);

        let coordinator = Coordinator {
            size,
            max_retry: self.config.max_retry,
            ledger: ChunkLedger::from_plan(&plan),
            tasks: task_tx.clone(),
            results: inter_rx,
            out: out_tx,
        };

        let context = Arc::new(WorkerContext {
            client: Arc::clone(&self.client),
            template: request.clone(),
            config: self.config.clone(),
            size,
        });
        let queue = Arc::new(Mutex::new(task_rx));
        for id in 0..connections {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&context),
                Arc::clone(&queue),
                inter_tx.clone(),
                token.clone(),
            ));
        }
        drop(inter_tx);

        tokio::spawn(emit_tasks(plan, task_tx, token.clone()));

        let coordinator_token = token.clone();
        tokio::spawn(async move {
            let run = AssertUnwindSafe(coordinator.run(coordinator_token.clone()));
            if let Err(panic) = run.catch_unwind().await {
                error!(message = %panic_message(panic.as_ref()), "coordinator panicked");
                coordinator_token.cancel();
            }
        });

        ChunkStream::new(out_rx, token)
    }
}

async fn collect_body(mut body: BoxStream<'static, Result<Bytes>>) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.next().await {
        buf.extend_from_slice(&frame?);
    }
    Ok(buf.freeze())
}
