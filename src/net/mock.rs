//! Scripted fetcher for exercising resolution paths without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{ShellRequest, ShellResponse};

use super::{Fetch, FetchError};

/// In-memory fetcher keyed by URL. Counts calls so tests can assert a
/// request never reached the network, and flips offline to simulate a
/// dead connection.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, ShellResponse>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    pub fn insert(&self, url: &str, body: &[u8]) {
        self.insert_status(url, 200, body);
    }

    pub fn insert_status(&self, url: &str, status: u16, body: &[u8]) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            ShellResponse::new(status, HashMap::new(), body.to_vec()),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetch calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for MockFetcher {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Connection("simulated offline".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        match responses.get(request.url.as_str()) {
            Some(response) => Ok(response.clone()),
            None => Ok(ShellResponse::new(404, HashMap::new(), b"not found".to_vec())),
        }
    }
}
