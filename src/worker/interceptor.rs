//! Request interception: the cache-first resolution policy.
//!
//! Navigations resolve cache, then network, then the cached shell
//! document. Resources resolve cache, then network (storing fresh
//! success responses in the background), then one late cache recheck.
//! Cache-layer failures never cross this boundary; they degrade to
//! misses.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::BucketStore;
use crate::models::{RequestMode, Resolution, Resolved, ShellRequest, ShellResponse};
use crate::net::{Fetch, FetchError};

/// Terminal resolution failure: the request fails for the caller exactly
/// as it would have without the worker.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no cached response for {identity} and network fetch failed: {source}")]
    Unreachable {
        identity: String,
        #[source]
        source: FetchError,
    },
}

pub struct RequestInterceptor<F> {
    store: Arc<BucketStore>,
    fetcher: Arc<F>,
    bucket: String,
    /// The cached root document served when an offline navigation has no
    /// match of its own.
    shell_document: ShellRequest,
}

impl<F: Fetch> RequestInterceptor<F> {
    pub fn new(
        store: Arc<BucketStore>,
        fetcher: Arc<F>,
        bucket: impl Into<String>,
        shell_document: ShellRequest,
    ) -> Self {
        Self {
            store,
            fetcher,
            bucket: bucket.into(),
            shell_document,
        }
    }

    /// Resolve one intercepted request.
    pub async fn resolve(&self, request: &ShellRequest) -> Result<Resolved, ResolveError> {
        let resolved = match request.mode {
            RequestMode::Navigate => self.resolve_navigation(request).await,
            RequestMode::Resource => self.resolve_resource(request).await,
        }?;

        debug!(
            identity = %request.identity(),
            mode = ?request.mode,
            resolution = resolved.resolution.as_str(),
            "request resolved"
        );
        Ok(resolved)
    }

    /// Cache lookup that degrades storage errors to misses.
    async fn try_lookup(&self, request: &ShellRequest) -> Option<ShellResponse> {
        match self.store.lookup(&self.bucket, &request.identity()).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(
                    identity = %request.identity(),
                    error = %e,
                    "cache lookup failed, treating as miss"
                );
                None
            }
        }
    }

    /// Navigations are cache-first with the shell document as the
    /// offline fallback. The shell may be the wrong document for a
    /// deep-linked route, but it keeps the application renderable;
    /// callers can tell it happened from the `ShellFallback` resolution.
    async fn resolve_navigation(&self, request: &ShellRequest) -> Result<Resolved, ResolveError> {
        if let Some(response) = self.try_lookup(request).await {
            return Ok(Resolved {
                response,
                resolution: Resolution::CacheHit,
            });
        }

        match self.fetcher.fetch(request).await {
            // Returned whatever the status; navigations are never stored
            Ok(response) => Ok(Resolved {
                response,
                resolution: Resolution::Network,
            }),
            Err(source) => {
                if let Some(response) = self.try_lookup(&self.shell_document).await {
                    return Ok(Resolved {
                        response,
                        resolution: Resolution::ShellFallback,
                    });
                }
                Err(ResolveError::Unreachable {
                    identity: request.identity(),
                    source,
                })
            }
        }
    }

    /// Resources are cache-first; a fresh success response is cloned and
    /// stored without blocking the caller. On network failure the cache
    /// is checked once more, covering an entry written concurrently
    /// since the first miss.
    async fn resolve_resource(&self, request: &ShellRequest) -> Result<Resolved, ResolveError> {
        if let Some(response) = self.try_lookup(request).await {
            return Ok(Resolved {
                response,
                resolution: Resolution::CacheHit,
            });
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                // Only successful GETs are cacheable
                if response.is_success() && request.method == "GET" {
                    self.store_in_background(request.clone(), response.clone());
                    Ok(Resolved {
                        response,
                        resolution: Resolution::NetworkStored,
                    })
                } else {
                    Ok(Resolved {
                        response,
                        resolution: Resolution::Network,
                    })
                }
            }
            Err(source) => {
                if let Some(response) = self.try_lookup(request).await {
                    return Ok(Resolved {
                        response,
                        resolution: Resolution::LateCacheHit,
                    });
                }
                Err(ResolveError::Unreachable {
                    identity: request.identity(),
                    source,
                })
            }
        }
    }

    /// Fire-and-forget store of a cloned response. The caller's copy is
    /// already on its way back; a dropped or failed write here is logged
    /// and otherwise not an error.
    fn store_in_background(&self, request: ShellRequest, response: ShellResponse) {
        let store = Arc::clone(&self.store);
        let bucket = self.bucket.clone();
        tokio::spawn(async move {
            if let Err(e) = store.store(&bucket, &request, response).await {
                warn!(
                    bucket = %bucket,
                    identity = %request.identity(),
                    error = %e,
                    "background cache store failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock::MockFetcher;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    const BUCKET: &str = "app-v1";

    fn request(url: &str) -> ShellRequest {
        ShellRequest::get(Url::parse(url).unwrap())
    }

    fn navigation(url: &str) -> ShellRequest {
        ShellRequest::navigate(Url::parse(url).unwrap())
    }

    fn response(body: &[u8]) -> ShellResponse {
        ShellResponse::new(200, HashMap::new(), body.to_vec())
    }

    fn interceptor(
        store: Arc<BucketStore>,
        fetcher: Arc<MockFetcher>,
    ) -> RequestInterceptor<MockFetcher> {
        let shell = request("https://example.net/index.html");
        RequestInterceptor::new(store, fetcher, BUCKET, shell)
    }

    /// Poll the store until the background write lands.
    async fn wait_for_entry(store: &BucketStore, identity: &str) -> ShellResponse {
        for _ in 0..50 {
            if let Ok(Some(hit)) = store.lookup(BUCKET, identity).await {
                return hit;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("entry {identity} never appeared in bucket");
    }

    #[tokio::test]
    async fn test_cached_resource_never_reaches_network() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());

        let req = request("https://example.net/main.js?v=1.0.0");
        store.store(BUCKET, &req, response(b"cached")).await.unwrap();

        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));
        let resolved = interceptor.resolve(&req).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::CacheHit);
        assert_eq!(resolved.response.body, b"cached");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_uncached_resource_is_fetched_and_stored_in_background() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("https://example.net/data.json", b"fresh");

        let req = request("https://example.net/data.json");
        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));

        // The response comes back regardless of the background write
        let resolved = interceptor.resolve(&req).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::NetworkStored);
        assert_eq!(resolved.response.body, b"fresh");

        let stored = wait_for_entry(&store, &req.identity()).await;
        assert_eq!(stored.body, b"fresh");
    }

    #[tokio::test]
    async fn test_non_success_response_is_not_stored() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert_status("https://example.net/flaky", 500, b"boom");

        let req = request("https://example.net/flaky");
        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));

        let resolved = interceptor.resolve(&req).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Network);
        assert_eq!(resolved.response.status, 500);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.lookup(BUCKET, &req.identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_is_never_stored() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("https://example.net/api/score", b"ok");

        let req = ShellRequest::new(
            "POST",
            Url::parse("https://example.net/api/score").unwrap(),
            RequestMode::Resource,
        );
        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));

        let resolved = interceptor.resolve(&req).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Network);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.lookup(BUCKET, &req.identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_uncached_resource_fails_like_no_worker() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);

        let req = request("https://example.net/data.json");
        let interceptor = interceptor(store, fetcher);

        let err = interceptor.resolve(&req).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_offline_resource_rechecks_cache_after_failure() {
        // A concurrent resolution may store the entry between the first
        // miss and the failed fetch; simulate that window with a fetcher
        // that writes the entry before failing.
        struct InsertThenFail {
            store: Arc<BucketStore>,
        }

        impl Fetch for InsertThenFail {
            async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
                self.store
                    .store(BUCKET, request, response(b"raced"))
                    .await
                    .unwrap();
                Err(FetchError::Connection("down".to_string()))
            }
        }

        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(InsertThenFail {
            store: Arc::clone(&store),
        });

        let req = request("https://example.net/data.json");
        let shell = request("https://example.net/index.html");
        let interceptor = RequestInterceptor::new(store, fetcher, BUCKET, shell);

        let resolved = interceptor.resolve(&req).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::LateCacheHit);
        assert_eq!(resolved.response.body, b"raced");
    }

    #[tokio::test]
    async fn test_navigation_prefers_cache() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());

        let nav = navigation("https://example.net/");
        store.store(BUCKET, &nav, response(b"<html>")).await.unwrap();

        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));
        let resolved = interceptor.resolve(&nav).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::CacheHit);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_navigation_miss_goes_to_network_without_storing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("https://example.net/about", b"<about>");

        let nav = navigation("https://example.net/about");
        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));

        let resolved = interceptor.resolve(&nav).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::Network);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.lookup(BUCKET, &nav.identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_navigation_falls_back_to_shell() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);

        let shell = request("https://example.net/index.html");
        store.store(BUCKET, &shell, response(b"<shell>")).await.unwrap();

        // Any deep-linked path gets the shell while offline
        let nav = navigation("https://example.net/deep/route");
        let interceptor = interceptor(Arc::clone(&store), Arc::clone(&fetcher));

        let resolved = interceptor.resolve(&nav).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::ShellFallback);
        assert_eq!(resolved.response.body, b"<shell>");
    }

    #[tokio::test]
    async fn test_offline_navigation_without_shell_fails() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_offline(true);

        let nav = navigation("https://example.net/");
        let interceptor = interceptor(store, fetcher);

        let err = interceptor.resolve(&nav).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_bucket_degrades_to_miss() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BucketStore::open(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("https://example.net/data.json", b"fresh");

        std::fs::write(dir.path().join(format!("{BUCKET}.json")), "not json").unwrap();

        let req = request("https://example.net/data.json");
        let interceptor = interceptor(store, fetcher);

        // Lookup errors stay inside the interceptor; the caller still
        // gets the network response.
        let resolved = interceptor.resolve(&req).await.unwrap();
        assert_eq!(resolved.resolution, Resolution::NetworkStored);
        assert_eq!(resolved.response.body, b"fresh");
    }
}
