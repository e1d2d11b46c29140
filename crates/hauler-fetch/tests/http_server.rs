//! End-to-end tests against a local axum server through `ReqwestClient`.

#![cfg(feature = "reqwest")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use bytes::Bytes;
use futures_util::StreamExt;
use hauler_fetch::{BasicAuth, ChunkStream, FetchConfig, FetchError, Fetcher, ReqwestClient, Request};
use hauler_progress::{MemorySink, ProgressWriter, WriteAt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const SIZE: usize = 256 * 1024 + 17;

struct ServerState {
    data:   Bytes,
    ranged: AtomicUsize,
}

/// Lightweight HTTP test server wrapper.
struct TestHttpServer {
    base_url:    String,
    state:       Arc<ServerState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestHttpServer {
    async fn new() -> Self {
        let state = Arc::new(ServerState {
            data:   Bytes::from(sample(SIZE)),
            ranged: AtomicUsize::new(0),
        });
        let router = Router::new()
            .route("/ranged", any(ranged))
            .route("/plain", any(plain))
            .route("/missing", get(missing))
            .route("/protected", get(protected))
            .route("/echo", post(echo))
            .route("/slow", get(slow))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test HTTP listener");
        let addr = listener
            .local_addr()
            .expect("read test listener local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(async move {
            server.await.expect("run test HTTP server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

fn sample(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 % 256) as u8).collect()
}

fn parse_range(headers: &HeaderMap) -> Option<(usize, usize)> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn ranged(
    State(state): State<Arc<ServerState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let total = state.data.len();
    let builder = Response::builder().header(header::ACCEPT_RANGES, "bytes");

    if method == Method::HEAD {
        return builder
            .header(header::CONTENT_LENGTH, total)
            .body(Body::empty())
            .unwrap();
    }

    match parse_range(&headers) {
        Some((start, end)) if start <= end && end < total => {
            state.ranged.fetch_add(1, Ordering::SeqCst);
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{total}"),
                )
                .header(header::CONTENT_LENGTH, end - start + 1)
                .body(Body::from(state.data.slice(start..=end)))
                .unwrap()
        }
        Some(_) => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => builder
            .header(header::CONTENT_LENGTH, total)
            .body(Body::from(state.data.clone()))
            .unwrap(),
    }
}

async fn plain(State(state): State<Arc<ServerState>>, method: Method) -> Response {
    let builder = Response::builder().header(header::CONTENT_LENGTH, state.data.len());
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(state.data.clone())
    };
    builder.body(body).unwrap()
}

async fn missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such resource")
}

async fn protected(headers: HeaderMap) -> Response {
    // user:pass
    let expected = "Basic dXNlcjpwYXNz";
    match headers.get(header::AUTHORIZATION) {
        Some(value) if value == expected => (
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"user":"user","admin":false}"#,
        )
            .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn echo(body: Bytes) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], body)
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "late"
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Account {
    user:  String,
    admin: bool,
}

fn fetcher() -> Fetcher<ReqwestClient> {
    Fetcher::new(ReqwestClient::new().unwrap())
        .with_config(FetchConfig::default().retry_backoff(Duration::ZERO, Duration::ZERO))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

async fn reassemble(size: usize, mut chunks: ChunkStream) -> Vec<u8> {
    let sink = MemorySink::new(size);
    let writer = ProgressWriter::new(&sink, size as u64);
    while let Some(chunk) = chunks.next().await {
        let data = chunk.outcome.expect("chunk failed");
        writer.write_at(&data, chunk.start).unwrap();
    }
    assert_eq!(writer.written(), size as u64);
    writer.close();
    sink.into_inner()
}

#[tokio::test]
async fn test_concurrent_fetch_matches_whole_fetch() {
    init_tracing();
    let server = TestHttpServer::new().await;
    let fetcher = fetcher();
    let request = Request::new().get(server.url("/ranged"));
    let cancel = CancellationToken::new();

    let (descriptor, chunks) = fetcher.fetch_concurrent(&cancel, &request, 4).await.unwrap();
    assert_eq!(descriptor.size, Some(SIZE as u64));
    assert!(descriptor.range_supported);
    let concurrent = reassemble(SIZE, chunks).await;
    assert_eq!(server.state.ranged.load(Ordering::SeqCst), 4);

    let whole = fetcher.execute(&request).await.unwrap();
    assert_eq!(digest(&concurrent), digest(whole.body()));
    assert_eq!(digest(&concurrent), digest(&server.state.data));
}

#[tokio::test]
async fn test_server_without_ranges_falls_back() {
    let server = TestHttpServer::new().await;
    let fetcher = fetcher();
    let request = Request::new().get(server.url("/plain"));
    let cancel = CancellationToken::new();

    let (descriptor, mut chunks) = fetcher.fetch_concurrent(&cancel, &request, 4).await.unwrap();
    assert!(!descriptor.range_supported);

    let only = chunks.next().await.unwrap();
    assert_eq!(only.start, 0);
    assert_eq!(only.end, SIZE as u64 - 1);
    assert_eq!(digest(only.data().unwrap()), digest(&server.state.data));
    assert!(chunks.next().await.is_none());
}

#[tokio::test]
async fn test_status_error_carries_response() {
    let server = TestHttpServer::new().await;
    let fetcher = fetcher();
    let request = Request::new().get(server.url("/missing"));

    let err = fetcher.execute(&request).await.unwrap_err();
    let response = err.response().expect("status error");
    assert_eq!(response.status(), 404);
    assert_eq!(response.text_lossy(), "no such resource");
    assert!(err.to_string().contains("404"));

    let response = fetcher.execute(&request.no_error_on_fail()).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_probe_of_missing_resource_fails() {
    let server = TestHttpServer::new().await;
    let request = Request::new().get(server.url("/missing"));
    let cancel = CancellationToken::new();

    let err = fetcher().fetch_concurrent(&cancel, &request, 2).await.unwrap_err();
    assert!(matches!(err, FetchError::Probe(_)));
    assert_eq!(err.response().map(|r| r.status()), Some(404));
}

#[tokio::test]
async fn test_basic_auth_and_json_decoding() {
    let server = TestHttpServer::new().await;
    let fetcher = fetcher();
    let request = Request::new().get(server.url("/protected"));

    let err = fetcher.execute(&request).await.unwrap_err();
    assert_eq!(err.response().map(|r| r.status()), Some(401));

    let response = fetcher
        .execute(&request.auth(BasicAuth::new("user", "pass")))
        .await
        .unwrap();
    let account: Account = fetcher.decode_json(&response).unwrap();
    assert_eq!(account, Account {
        user:  "user".into(),
        admin: false,
    });
}

#[tokio::test]
async fn test_json_body_round_trip() {
    let server = TestHttpServer::new().await;
    let fetcher = fetcher();
    let account = Account {
        user:  "ada".into(),
        admin: true,
    };

    let request = fetcher
        .json_body(Request::new().post(server.url("/echo")), &account)
        .unwrap();
    assert_eq!(request.headers().get("content-type"), Some("application/json"));

    let response = fetcher.execute(&request).await.unwrap();
    assert_eq!(response.json::<Account>().unwrap(), account);
}

#[tokio::test]
async fn test_request_timeout() {
    let server = TestHttpServer::new().await;
    let request = Request::new()
        .get(server.url("/slow"))
        .timeout(Duration::from_millis(100));

    let err = fetcher().execute(&request).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = Request::new().get(format!("http://{addr}/gone"));
    let err = fetcher().execute(&request).await.unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
}
