//! Data models for the cache worker.
//!
//! - `ShellRequest`, `RequestMode`: intercepted request identity and its
//!   navigation-vs-resource classification
//! - `ShellResponse`: fully buffered response, cloneable for the
//!   clone-then-store pattern
//! - `Resolved`, `Resolution`: the per-request record of which path a
//!   resolution took
//! - `SeedManifest`: the ordered shell URL list populated at install

pub mod manifest;
pub mod request;
pub mod response;

pub use manifest::{ManifestError, SeedManifest};
pub use request::{RequestMode, ShellRequest};
pub use response::{Resolution, Resolved, ShellResponse};
