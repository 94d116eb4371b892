//! HTTP transport used by the lifecycle layer.

mod http;

pub use http::{HttpTransport, TransportError};
