//! Buffered responses and per-request resolution records.

use std::collections::HashMap;

/// A fully buffered HTTP response.
///
/// The body is held in memory rather than streamed so that a single
/// response can be handed to two readers: one copy goes back to the
/// caller, a clone goes to the cache. Cloning is the explicit
/// duplication step the opportunistic-store path relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ShellResponse {
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Success in the HTTP 2xx sense. Only successful responses are ever
    /// written to a bucket.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The path a request took through the resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Answered from the current bucket.
    CacheHit,
    /// Fetched from the network, nothing stored.
    Network,
    /// Fetched from the network and stored in the background.
    NetworkStored,
    /// Network failed but a concurrent resolution had cached it meanwhile.
    LateCacheHit,
    /// Offline navigation served the cached shell document instead.
    ShellFallback,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::CacheHit => "cache",
            Resolution::Network => "network",
            Resolution::NetworkStored => "network+stored",
            Resolution::LateCacheHit => "late-cache",
            Resolution::ShellFallback => "shell-fallback",
        }
    }
}

/// Outcome of one intercepted request: the response to hand back and the
/// resolution path that produced it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: ShellResponse,
    pub resolution: Resolution,
}
