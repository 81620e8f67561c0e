//! Host wiring for the cache worker.
//!
//! `App` plays the part of the host environment: it builds the store,
//! fetcher, interceptor and lifecycle controller from configuration,
//! adapts process restarts onto the lifecycle machine, and exposes the
//! operations the CLI drives (precache, resolve, status, purge).

use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use crate::cache::{BucketStore, BucketSummary};
use crate::config::Config;
use crate::models::{Resolved, SeedManifest, ShellRequest};
use crate::net::HttpFetcher;
use crate::worker::{LifecycleController, RequestInterceptor, WorkerState};

/// Client id used for the local invocation.
const LOCAL_CLIENT_ID: &str = "local-session";

pub struct App {
    config: Config,
    store: Arc<BucketStore>,
    lifecycle: LifecycleController<HttpFetcher>,
}

/// Result of a full precache run.
#[derive(Debug)]
pub struct PrecacheReport {
    pub bucket: String,
    pub entries: usize,
    pub purged: usize,
}

/// Snapshot of worker and store state for `status` output.
#[derive(Debug)]
pub struct StatusReport {
    pub origin: String,
    pub current_bucket: String,
    pub state: WorkerState,
    pub buckets: Vec<BucketSummary>,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load().context("failed to load configuration")?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let cache_dir = Config::cache_dir()?;
        let store = Arc::new(
            BucketStore::open(&cache_dir)
                .with_context(|| format!("failed to open cache at {}", cache_dir.display()))?,
        );
        let fetcher = Arc::new(HttpFetcher::new().context("failed to build HTTP client")?);

        let manifest = SeedManifest::resolve(&config.origin, &config.precache)
            .context("invalid precache manifest")?;
        let shell_url = Url::parse(&config.origin)
            .and_then(|base| base.join(&config.navigation_fallback))
            .context("invalid navigation fallback")?;

        let interceptor = RequestInterceptor::new(
            Arc::clone(&store),
            Arc::clone(&fetcher),
            &config.cache_name,
            ShellRequest::get(shell_url),
        );
        let mut lifecycle = LifecycleController::new(
            Arc::clone(&store),
            fetcher,
            interceptor,
            manifest,
            &config.cache_name,
        );
        lifecycle.clients_mut().add(LOCAL_CLIENT_ID, &config.origin);

        Ok(Self {
            config,
            store,
            lifecycle,
        })
    }

    /// Full install + activate, re-fetching the manifest even when this
    /// version's bucket already exists.
    pub async fn precache(&mut self) -> Result<PrecacheReport> {
        let entries = self
            .lifecycle
            .install()
            .await
            .context("install failed; the previously deployed version, if any, stays active")?;
        let purged = self.lifecycle.activate().await;

        Ok(PrecacheReport {
            bucket: self.config.cache_name.clone(),
            entries,
            purged,
        })
    }

    /// Bring the worker to Ready, installing only when this version's
    /// bucket is missing - a completed install survives process restarts.
    async fn ensure_ready(&mut self) -> Result<()> {
        if self.lifecycle.state() == WorkerState::Ready {
            return Ok(());
        }
        if !self.lifecycle.resume() {
            self.lifecycle
                .install()
                .await
                .context("install failed and no previous bucket exists for this version")?;
        }
        self.lifecycle.activate().await;
        Ok(())
    }

    /// Resolve one URL through the worker policy.
    pub async fn resolve(&mut self, target: &str, navigate: bool) -> Result<Resolved> {
        self.ensure_ready().await?;

        let url = Self::parse_target(&self.config.origin, target)?;
        let request = if navigate {
            ShellRequest::navigate(url)
        } else {
            ShellRequest::get(url)
        };

        match self.lifecycle.handle_fetch(&request).await? {
            Some(resolved) => Ok(resolved),
            None => anyhow::bail!("worker is not ready"),
        }
    }

    /// Absolute URLs pass through; bare paths resolve against the
    /// configured origin.
    fn parse_target(origin: &str, target: &str) -> Result<Url> {
        if target.starts_with("http://") || target.starts_with("https://") {
            Url::parse(target).with_context(|| format!("invalid url: {target}"))
        } else {
            Url::parse(origin)
                .and_then(|base| base.join(target))
                .with_context(|| format!("cannot resolve {target} against {origin}"))
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            origin: self.config.origin.clone(),
            current_bucket: self.config.cache_name.clone(),
            state: self.lifecycle.state(),
            buckets: self.store.summarize().await,
        }
    }

    /// Manual stale-bucket purge against the configured version.
    pub async fn purge(&mut self) -> usize {
        self.store.purge_stale(&self.config.cache_name).await
    }
}
