//! Concurrent ranged HTTP fetching.
//!
//! A resource is probed for its size and `Accept-Ranges` support, split into
//! contiguous byte ranges, and fetched over a bounded pool of connections.
//! Failed ranges are retried up to a cap; completed fragments are streamed
//! to the caller in completion order, each tagged with its offset, so they
//! can be written straight into a random-access sink.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable request templates, configuration and chunk records
//! - [`core`] - Pure transformations: planning, retry state, status checks
//! - `effects` - I/O operations behind the [`HttpClient`] trait
//!
//! # Key Features
//!
//! - **Bounded pipeline**: every queue has a fixed capacity, so a slow
//!   consumer throttles the workers instead of buffering the resource
//! - **Per-range retry**: only the unread remainder of a failed range is
//!   requested again
//! - **Cancellation**: one token stops every worker; dropping the
//!   [`ChunkStream`] has the same effect
//! - **Fallback**: servers without range support are fetched as a whole

pub mod core;
mod data;
mod effects;
mod error;

pub use data::{
    AuthProvider, BasicAuth, BearerAuth, ChunkResult, ChunkTask, FetchConfig, Headers, JsonCodec,
    Method, PreparedRequest, Request, ResourceDescriptor, Response, SerdeJsonCodec, TimeoutPolicy,
};
pub use effects::{BoxStream, ChunkStream, Fetcher, HttpClient, RawResponse};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{FetchError, Result};
