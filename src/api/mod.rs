//! Purpose: Define the public Rust API boundary for the NSQ HTTP API client.
//! Exports: Request/decode entry points, `ApiClient`, endpoint helper, and error types.
//! Role: Public, additive-only surface used by the `nsq-api` binary and library callers.
//! Invariants: This module is the only public path to transport and decoding helpers.

mod client;
mod endpoint;

pub use crate::core::envelope::{
    ACCEPT_V1, CONTENT_TYPE_HEADER, CONTENT_TYPE_V1, Envelope, ResponseFormat,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::transport::{DEFAULT_TIMEOUT, DeadlineMode, TransportConfig};
pub use client::{ApiClient, ApiResult, api_request_negotiate_v1, api_request_negotiate_v1_into};
pub use endpoint::endpoint;
