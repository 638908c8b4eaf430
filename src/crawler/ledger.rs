use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::trace;
use url::Url;

/// How URLs are keyed in the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPolicy {
    /// Compare URLs exactly as discovered
    #[default]
    Exact,
    /// Collapse trivial variants of the same page onto one key
    Canonical,
}

/// Set of URLs already claimed by one crawl.
///
/// Clones share the same underlying set. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct VisitLedger {
    visited: Arc<Mutex<HashSet<String>>>,
    policy: UrlPolicy,
}

impl VisitLedger {
    pub fn new(policy: UrlPolicy) -> Self {
        Self {
            visited: Arc::new(Mutex::new(HashSet::new())),
            policy,
        }
    }

    /// Record `url` as visited. Returns false if it already was.
    ///
    /// Lookup and insert happen under a single lock acquisition, so two
    /// concurrent callers can never both win the same key.
    pub async fn try_claim(&self, url: &str) -> bool {
        let key = self.key_for(url);
        let mut visited = self.visited.lock().await;
        let claimed = visited.insert(key);
        if !claimed {
            trace!("Already visited: {}", url);
        }
        claimed
    }

    pub async fn contains(&self, url: &str) -> bool {
        let key = self.key_for(url);
        self.visited.lock().await.contains(&key)
    }

    pub async fn len(&self) -> usize {
        self.visited.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.visited.lock().await.is_empty()
    }

    pub fn policy(&self) -> UrlPolicy {
        self.policy
    }

    fn key_for(&self, url: &str) -> String {
        match self.policy {
            UrlPolicy::Exact => url.to_string(),
            UrlPolicy::Canonical => canonicalize(url),
        }
    }
}

/// Normalize a URL to avoid duplicates due to minor differences.
///
/// Host case and default ports are already normalized by the parser. On top
/// of that the fragment goes, a trailing slash on a non-root path goes and
/// query parameters are sorted by key.
pub fn canonicalize(url: &str) -> String {
    let mut normalized = match Url::parse(url) {
        Ok(url) => url,
        Err(_) => return url.to_string(),
    };

    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }

    if let Some(query) = normalized.query() {
        if query.is_empty() {
            normalized.set_query(None);
        } else {
            let mut params: Vec<&str> = query.split('&').collect();
            params.sort_by(|a, b| a.split('=').next().cmp(&b.split('=').next()));
            let sorted_query = params.join("&");
            normalized.set_query(Some(&sorted_query));
        }
    }

    normalized.to_string()
}
