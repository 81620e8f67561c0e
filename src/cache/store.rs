//! Versioned bucket store: one named cache bucket per deployed version.
//!
//! Each bucket is a single JSON file under the cache directory mapping
//! request identities to stored responses. Buckets load lazily into an
//! in-memory index and persist write-through; bucket files are replaced
//! atomically (temp file + rename), so a bucket is either fully written
//! or not there at all.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{ShellRequest, ShellResponse};
use crate::net::{Fetch, FetchError};

// ============================================================================
// Constants
// ============================================================================

/// Maximum concurrent fetches while seeding a bucket.
/// Keeps install from opening one connection per manifest entry; manifest
/// order is preserved.
const MAX_CONCURRENT_SEED_FETCHES: usize = 8;

/// File extension for bucket files in the cache directory.
const BUCKET_EXT: &str = "json";

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Install-time seeding failure. Any single failed manifest fetch aborts
/// the whole population step; no partial bucket is ever written.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("seed fetch for {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("seed fetch for {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Entries and buckets
// ============================================================================

/// One cached response, keyed in its bucket by request identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(request: &ShellRequest, response: &ShellResponse) -> Self {
        Self {
            url: request.url.to_string(),
            method: request.method.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: Utc::now(),
        }
    }

    pub fn to_response(&self) -> ShellResponse {
        ShellResponse::new(self.status, self.headers.clone(), self.body.clone())
    }
}

/// On-disk form of a bucket.
#[derive(Debug, Serialize, Deserialize)]
struct BucketFile {
    created_at: DateTime<Utc>,
    entries: HashMap<String, StoredEntry>,
}

#[derive(Debug)]
struct Bucket {
    created_at: DateTime<Utc>,
    entries: HashMap<String, StoredEntry>,
}

/// Summary of one bucket for status output.
#[derive(Debug)]
pub struct BucketSummary {
    pub name: String,
    pub entries: usize,
    pub created: String,
}

// ============================================================================
// Store
// ============================================================================

/// The versioned cache store.
///
/// Concurrent reads and concurrent inserts of distinct keys are safe
/// behind the RwLock; same-key writes are last-write-wins, which is fine
/// for idempotent GET responses.
pub struct BucketStore {
    root: PathBuf,
    loaded: RwLock<HashMap<String, Bucket>>,
}

impl BucketStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    fn bucket_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, BUCKET_EXT))
    }

    fn read_bucket_file(path: &Path) -> Result<Option<Bucket>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let file: BucketFile = serde_json::from_str(&contents)?;
        Ok(Some(Bucket {
            created_at: file.created_at,
            entries: file.entries,
        }))
    }

    /// Atomic replace via temp file + rename. Bodies are raw bytes, so
    /// the JSON is written compact.
    fn write_bucket_file(path: &Path, bucket: &Bucket) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct BucketFileRef<'a> {
            created_at: DateTime<Utc>,
            entries: &'a HashMap<String, StoredEntry>,
        }

        let json = serde_json::to_string(&BucketFileRef {
            created_at: bucket.created_at,
            entries: &bucket.entries,
        })?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Load a bucket into the index if its file exists. Returns whether
    /// the bucket exists at all.
    async fn ensure_loaded(&self, name: &str) -> Result<bool, StoreError> {
        {
            let loaded = self.loaded.read().await;
            if loaded.contains_key(name) {
                return Ok(true);
            }
        }

        match Self::read_bucket_file(&self.bucket_path(name))? {
            Some(bucket) => {
                let mut loaded = self.loaded.write().await;
                loaded.entry(name.to_string()).or_insert(bucket);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Seed a bucket from the manifest: fetch every URL, then persist the
    /// whole entry map at once. Fails on the first transport error or
    /// non-success status, leaving any previous bucket contents untouched.
    ///
    /// Re-populating an existing bucket is idempotent: the map is rebuilt
    /// from scratch, so there is exactly one entry per manifest URL and
    /// the latest content wins.
    pub async fn populate<F: Fetch>(
        &self,
        name: &str,
        manifest: &[ShellRequest],
        fetcher: &F,
    ) -> Result<usize, SeedError> {
        let responses: Vec<(ShellRequest, ShellResponse)> = stream::iter(manifest)
            .map(|request| async move {
                let response =
                    fetcher
                        .fetch(request)
                        .await
                        .map_err(|source| SeedError::Fetch {
                            url: request.url.to_string(),
                            source,
                        })?;
                if !response.is_success() {
                    return Err(SeedError::Status {
                        url: request.url.to_string(),
                        status: response.status,
                    });
                }
                debug!(url = %request.url, "seeded");
                Ok((request.clone(), response))
            })
            .buffered(MAX_CONCURRENT_SEED_FETCHES)
            .try_collect()
            .await?;

        let mut entries = HashMap::with_capacity(responses.len());
        for (request, response) in &responses {
            entries.insert(request.identity(), StoredEntry::new(request, response));
        }

        let bucket = Bucket {
            created_at: Utc::now(),
            entries,
        };
        Self::write_bucket_file(&self.bucket_path(name), &bucket).map_err(SeedError::Store)?;

        let count = bucket.entries.len();
        self.loaded.write().await.insert(name.to_string(), bucket);

        info!(bucket = name, entries = count, "bucket populated");
        Ok(count)
    }

    /// Delete every bucket whose name differs from `current`. Individual
    /// delete failures are logged and skipped; never fails fatally.
    /// Returns the number of buckets deleted.
    pub async fn purge_stale(&self, current: &str) -> usize {
        let mut deleted = 0;

        match fs::read_dir(&self.root) {
            Ok(dir_entries) => {
                for dir_entry in dir_entries.flatten() {
                    let path = dir_entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(BUCKET_EXT) {
                        continue;
                    }
                    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    if name == current {
                        continue;
                    }
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            info!(bucket = name, "stale bucket deleted");
                            deleted += 1;
                        }
                        Err(e) => {
                            warn!(bucket = name, error = %e, "failed to delete stale bucket")
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to enumerate cache directory"),
        }

        self.loaded.write().await.retain(|name, _| name == current);

        deleted
    }

    /// Read a stored response. Never mutates cache contents; a corrupt or
    /// unreadable bucket file surfaces as `Err`, which callers treat as
    /// a miss.
    pub async fn lookup(
        &self,
        name: &str,
        identity: &str,
    ) -> Result<Option<ShellResponse>, StoreError> {
        if !self.ensure_loaded(name).await? {
            return Ok(None);
        }

        let loaded = self.loaded.read().await;
        Ok(loaded
            .get(name)
            .and_then(|bucket| bucket.entries.get(identity))
            .map(StoredEntry::to_response))
    }

    /// Insert or replace one entry and persist the bucket. Only called
    /// with success-status responses; callers filter before storing.
    pub async fn store(
        &self,
        name: &str,
        request: &ShellRequest,
        response: ShellResponse,
    ) -> Result<(), StoreError> {
        let entry = StoredEntry::new(request, &response);

        self.ensure_loaded(name).await?;

        let mut loaded = self.loaded.write().await;
        let bucket = loaded.entry(name.to_string()).or_insert_with(|| Bucket {
            created_at: Utc::now(),
            entries: HashMap::new(),
        });
        bucket.entries.insert(request.identity(), entry);
        Self::write_bucket_file(&self.bucket_path(name), bucket)?;

        debug!(bucket = name, identity = %request.identity(), "entry stored");
        Ok(())
    }

    /// Whether a bucket for `name` exists on disk. A completed install
    /// survives process restarts through this check.
    pub fn has_bucket(&self, name: &str) -> bool {
        self.bucket_path(name).exists()
    }

    /// Names of all buckets on disk, sorted.
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(dir_entries) = fs::read_dir(&self.root) {
            for dir_entry in dir_entries.flatten() {
                let path = dir_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(BUCKET_EXT) {
                    continue;
                }
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        names
    }

    /// Per-bucket summaries for status output. Unreadable buckets are
    /// logged and skipped rather than failing the whole report.
    pub async fn summarize(&self) -> Vec<BucketSummary> {
        let mut summaries = Vec::new();
        for name in self.bucket_names() {
            match self.ensure_loaded(&name).await {
                Ok(true) => {
                    let loaded = self.loaded.read().await;
                    if let Some(bucket) = loaded.get(&name) {
                        summaries.push(BucketSummary {
                            name: name.clone(),
                            entries: bucket.entries.len(),
                            created: age_display(bucket.created_at),
                        });
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(bucket = %name, error = %e, "failed to load bucket for status"),
            }
        }
        summaries
    }
}

/// Human-readable age for status output.
fn age_display(since: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - since).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

// ============================================================================
// Tests
// ============================================================================
