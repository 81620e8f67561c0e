//! Local bucket storage for offline request resolution.
//!
//! This module provides the `BucketStore`: one named, versioned cache
//! bucket per deployed release, persisted as JSON under the cache
//! directory. Install populates the current bucket from the seed
//! manifest; activate deletes every other bucket; request resolution
//! reads and opportunistically appends entries.

pub mod store;

pub use store::{BucketStore, BucketSummary, SeedError, StoreError, StoredEntry};
