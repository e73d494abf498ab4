//! Purpose: Blocking client library for the NSQ daemon administrative HTTP API.
//! Exports: `api` (request/decode entry points), `core` (transport, envelope, errors).
//! Role: Library backing the `nsq-api` binary and integration tests.
//! Invariants: No global state; every client owns its transport configuration.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
