//! Immutable data types for fetching operations.
//!
//! Request templates, authentication strategies, configuration, and the
//! chunk records that flow through the concurrent pipeline. Nothing in this
//! module performs I/O.

pub mod auth;
pub mod chunk;
pub mod codec;
pub mod options;
pub mod request;
pub mod response;

pub use auth::{AuthProvider, BasicAuth, BearerAuth};
pub use chunk::{ChunkResult, ChunkTask, ResourceDescriptor};
pub use codec::{JsonCodec, SerdeJsonCodec};
pub use options::FetchConfig;
pub use request::{Headers, Method, PreparedRequest, Request, TimeoutPolicy};
pub use response::Response;
