//! Low-level plumbing shared by every tradegate connector.
//!
//! Contains the process clock abstraction, the keyed mutex used to serialise
//! rate-ledger mutations, the per-call [`TimeProfile`](profile::TimeProfile),
//! and a configurable signed REST protocol layer
//! ([`RestClient`](protocol::http::rest::client::RestClient)).

/// Monotonic + wall clock abstraction and the suspend-until primitive.
pub mod clock;

/// Errors produced at the transport boundary.
pub mod error;

/// String-keyed asynchronous mutex with optional bounded concurrency.
pub mod keyed;

/// Per-call timing record stamped by the connector facade and transport.
pub mod profile;

/// Http protocol abstractions: [`RestRequest`](protocol::http::rest::RestRequest),
/// request signing, and response parsing.
pub mod protocol;
