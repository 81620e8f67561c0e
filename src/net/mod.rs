//! Network layer for the cache worker.
//!
//! The `Fetch` trait is the injected seam between the resolution policy
//! and the outside world: the worker never touches the network except
//! through it. `HttpFetcher` is the production implementation.

pub mod error;
pub mod fetcher;

#[cfg(test)]
pub mod mock;

pub use error::FetchError;
pub use fetcher::{Fetch, HttpFetcher};
