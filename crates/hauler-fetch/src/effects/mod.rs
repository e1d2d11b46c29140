//! I/O operations for HTTP fetching.
//!
//! Everything that touches the network or spawns tasks lives here: the
//! client seam, request execution, probing and the concurrent pipeline
//! (chunk emitter, workers and retry coordinator).

mod coordinator;
mod fetcher;
mod http;
mod pool;
mod stream;

pub use fetcher::Fetcher;
pub use http::{BoxStream, HttpClient, RawResponse};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use stream::ChunkStream;
