//! Worker lifecycle: Installing -> Activating -> Ready.
//!
//! One controller instance per deployed worker version; states only move
//! forward. Install seeds the version bucket and fails closed, activate
//! purges stale buckets and claims clients, and only a Ready worker
//! answers fetch events.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{BucketStore, SeedError};
use crate::models::{Resolved, SeedManifest, ShellRequest};
use crate::net::Fetch;

use super::clients::ClientRegistry;
use super::interceptor::{RequestInterceptor, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Activating,
    Ready,
}

pub struct LifecycleController<F> {
    store: Arc<BucketStore>,
    fetcher: Arc<F>,
    interceptor: RequestInterceptor<F>,
    clients: ClientRegistry,
    manifest: SeedManifest,
    bucket: String,
    state: WorkerState,
}

impl<F: Fetch> LifecycleController<F> {
    pub fn new(
        store: Arc<BucketStore>,
        fetcher: Arc<F>,
        interceptor: RequestInterceptor<F>,
        manifest: SeedManifest,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            interceptor,
            clients: ClientRegistry::new(),
            manifest,
            bucket: bucket.into(),
            state: WorkerState::Installing,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Host-side registry of open pages; activation claims them.
    pub fn clients_mut(&mut self) -> &mut ClientRegistry {
        &mut self.clients
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Install: seed the version bucket from the manifest. Fail-closed -
    /// on any seeding error the state stays Installing, nothing is
    /// written, and a previously deployed version remains in control.
    /// On success the worker is immediately eligible to activate; there
    /// is no waiting state.
    pub async fn install(&mut self) -> Result<usize, SeedError> {
        let count = self
            .store
            .populate(&self.bucket, self.manifest.requests(), self.fetcher.as_ref())
            .await?;

        self.state = WorkerState::Activating;
        info!(bucket = %self.bucket, entries = count, "install complete");
        Ok(count)
    }

    /// Adopt a completed install from an earlier process run: when this
    /// version's bucket already exists on disk, skip population and move
    /// straight to Activating. A version bump always takes the full
    /// install path, because its bucket cannot exist yet.
    pub fn resume(&mut self) -> bool {
        if self.state != WorkerState::Installing {
            return false;
        }
        if !self.store.has_bucket(&self.bucket) {
            return false;
        }

        self.state = WorkerState::Activating;
        info!(bucket = %self.bucket, "existing bucket adopted, skipping install");
        true
    }

    /// Activate: delete every stale bucket, claim all registered pages,
    /// and go Ready. Purge and claim never fail fatally. Returns the
    /// number of stale buckets deleted.
    pub async fn activate(&mut self) -> usize {
        if self.state != WorkerState::Activating {
            warn!(state = ?self.state, "activate outside Activating is a no-op");
            return 0;
        }

        let purged = self.store.purge_stale(&self.bucket).await;
        let claimed = self.clients.claim(&self.bucket);
        self.state = WorkerState::Ready;

        info!(bucket = %self.bucket, purged, claimed, "worker activated");
        purged
    }

    /// Delegate one fetch event. Outside Ready this returns `Ok(None)`:
    /// the explicit decision to let the host fall through to its default
    /// network handling rather than answer from a half-built worker.
    pub async fn handle_fetch(
        &self,
        request: &ShellRequest,
    ) -> Result<Option<Resolved>, ResolveError> {
        if self.state != WorkerState::Ready {
            return Ok(None);
        }
        self.interceptor.resolve(request).await.map(Some)
    }
}
