//! Intercepted request identity and classification.

use url::Url;

/// How the host classified an outgoing request.
///
/// Navigations are full-page document loads; everything else (scripts,
/// images, data requests) is a resource load. The two classes resolve
/// through different fallback chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    Resource,
}

/// One outgoing request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct ShellRequest {
    /// Uppercase HTTP method.
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl ShellRequest {
    pub fn new(method: &str, url: Url, mode: RequestMode) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            mode,
        }
    }

    /// A GET resource request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Resource)
    }

    /// A GET navigation (full-page load) request.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    /// Cache key for this request: method plus the URL without its
    /// fragment. The query string stays - it carries the version-busting
    /// parameter, so `/main.js?v=1.0.0` and `/main.js?v=1.0.1` are
    /// distinct identities. `Url` parsing already normalizes scheme,
    /// host case and default ports.
    pub fn identity(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method, url)
    }
}
