// Allow dead code: registry surface mirrors the host Clients API
#![allow(dead_code)]

//! Controlled-page registry.
//!
//! Tracks which worker version answers for which open page. Activation
//! claims every registered client, so pages opened under a previous
//! version route through the new version immediately.

use std::collections::HashMap;

use tracing::debug;

/// One open page under (potential) worker control.
#[derive(Debug, Clone)]
pub struct PageClient {
    pub id: String,
    pub url: String,
    /// Bucket name of the controlling worker version, if any.
    pub controller: Option<String>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, PageClient>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page. New pages start uncontrolled until a worker
    /// activation claims them.
    pub fn add(&mut self, id: impl Into<String>, url: impl Into<String>) {
        let id = id.into();
        self.clients.insert(
            id.clone(),
            PageClient {
                id,
                url: url.into(),
                controller: None,
            },
        );
    }

    pub fn remove(&mut self, id: &str) -> Option<PageClient> {
        self.clients.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&PageClient> {
        self.clients.get(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Point every registered page at `version`. Returns how many pages
    /// changed controller.
    pub fn claim(&mut self, version: &str) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut() {
            if client.controller.as_deref() != Some(version) {
                debug!(client = %client.id, url = %client.url, version, "client claimed");
                client.controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Number of pages controlled by `version`.
    pub fn controlled_by(&self, version: &str) -> usize {
        self.clients
            .values()
            .filter(|c| c.controller.as_deref() == Some(version))
            .count()
    }
}
