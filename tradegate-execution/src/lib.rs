#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Tradegate-Execution
//! Unified trading-connector gateway fronting Binance (spot / USDT-margined /
//! coin-margined), Bybit, Bitget, OKX, KuCoin and Coinbase behind one
//! provider-agnostic contract.
//!
//! Every public operation returns a [`CallOutcome`] carrying the normalized
//! payload (or terminal failure), a rate-ledger usage snapshot, and the
//! call's [`TimeProfile`](tradegate_integration::profile::TimeProfile).
//!
//! The hard core lives in three subsystems:
//! - [`governor`] — per-venue rate-limit ledgers that suspend callers
//!   precisely long enough to stay under published quotas;
//! - [`retry`] — failure classification deciding retry-after-sleep,
//!   fail-fast, or fatal-ban, with per-class backoff and governor
//!   back-pressure propagation;
//! - per-connector `normalize` modules — total mappings from venue payloads
//!   into the canonical data model.

use derive_more::Constructor;
use serde::{Deserialize, Serialize};
use tradegate_integration::profile::TimeProfile;

/// Per-venue connector facades implementing the provider-agnostic
/// [`Connector`](client::Connector) contract.
pub mod client;

/// Provider construction configuration and environment handling.
pub mod config;

/// Terminal call errors and the venue error representation consumed by
/// retry classifiers.
pub mod error;

/// Per-venue rate-limit governors.
pub mod governor;

/// Canonical order / position / instrument / fee / candle data model.
pub mod model;

/// Retry / failure-classification engine and the retry combinator owning
/// the attempt loop.
pub mod retry;

use error::CallError;
use governor::UsageReading;

/// Venue API credentials.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

/// Outcome of one public gateway operation.
///
/// Exactly one of data / error is present (enforced by the `Result`), and
/// both carry the usage snapshot and sealed [`TimeProfile`] so callers see
/// how much quota the call consumed even when it failed.
#[derive(Debug, Clone)]
pub struct CallOutcome<T> {
    pub result: Result<T, CallError>,
    pub usage: Vec<UsageReading>,
    pub profile: TimeProfile,
}

impl<T> CallOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The payload, discarding usage and timing.
    pub fn into_data(self) -> Result<T, CallError> {
        self.result
    }
}
