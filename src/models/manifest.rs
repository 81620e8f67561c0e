// Allow dead code: collection accessors exercised from tests
#![allow(dead_code)]

//! The seed manifest: shell URLs pre-populated at install time.

use thiserror::Error;
use url::Url;

use super::request::ShellRequest;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("invalid origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        source: url::ParseError,
    },

    #[error("invalid manifest entry {entry:?}: {source}")]
    InvalidEntry {
        entry: String,
        source: url::ParseError,
    },
}

/// The ordered, version-pinned list of URLs that must be present in a
/// bucket immediately after install. Entries are configured as paths
/// (usually with a `?v=` busting parameter) and resolved against the
/// configured origin.
#[derive(Debug, Clone)]
pub struct SeedManifest {
    requests: Vec<ShellRequest>,
}

impl SeedManifest {
    /// Resolve configured paths against the origin. Fails on the first
    /// entry that does not form a valid URL - a bad manifest should be
    /// caught at startup, not mid-install.
    pub fn resolve(origin: &str, paths: &[String]) -> Result<Self, ManifestError> {
        let base = Url::parse(origin).map_err(|source| ManifestError::InvalidOrigin {
            origin: origin.to_string(),
            source,
        })?;

        let mut requests = Vec::with_capacity(paths.len());
        for entry in paths {
            let url = base.join(entry).map_err(|source| ManifestError::InvalidEntry {
                entry: entry.clone(),
                source,
            })?;
            requests.push(ShellRequest::get(url));
        }

        Ok(Self { requests })
    }

    pub fn requests(&self) -> &[ShellRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_paths_against_origin() {
        let paths = vec!["/".to_string(), "/main.js?v=1.0.0".to_string()];
        let manifest = SeedManifest::resolve("https://example.net", &paths).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.requests()[0].url.as_str(), "https://example.net/");
        assert_eq!(
            manifest.requests()[1].url.as_str(),
            "https://example.net/main.js?v=1.0.0"
        );
    }

    #[test]
    fn test_preserves_order() {
        let paths = vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/main.js?v=1.0.0".to_string(),
            "/button.png?v=1.0.0".to_string(),
            "/manifest.json?v=1.0.0".to_string(),
        ];
        let manifest = SeedManifest::resolve("https://example.net", &paths).unwrap();

        let suffixes: Vec<&str> = manifest
            .requests()
            .iter()
            .map(|r| r.url.path())
            .collect();
        assert_eq!(
            suffixes,
            vec!["/", "/index.html", "/main.js", "/button.png", "/manifest.json"]
        );
    }

    #[test]
    fn test_rejects_bad_origin() {
        let err = SeedManifest::resolve("not a url", &[]).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidOrigin { .. }));
    }
}
