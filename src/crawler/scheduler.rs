use regex::Regex;
use url::Url;
use tracing::trace;

use crate::crawler::validator::ValidatedRequest;

/// Decides which discovered links the crawl follows
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    /// Host of the crawl seed; internal links must share it
    seed_host: String,

    /// Compiled path patterns; a link must match at least one
    patterns: Vec<Regex>,
}

impl LinkClassifier {
    /// Create a classifier for the given seed host and compiled patterns
    pub fn new(seed_host: impl Into<String>, patterns: Vec<Regex>) -> Self {
        Self {
            seed_host: seed_host.into(),
            patterns,
        }
    }

    pub fn from_request(request: &ValidatedRequest) -> Self {
        Self::new(request.seed_host(), request.patterns().to_vec())
    }

    /// Whether `link` is on the seed's host and passes the path patterns.
    ///
    /// An empty pattern list places no restriction on the path.
    pub fn is_internal(&self, link: &str) -> bool {
        let parsed = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => return false,
        };

        if parsed.host_str() != Some(self.seed_host.as_str()) {
            return false;
        }

        self.patterns.is_empty() || self.patterns.iter().any(|pattern| pattern.is_match(link))
    }

    /// Whether the crawl should schedule `link`.
    ///
    /// Fragment links are never followed on their own.
    pub fn should_follow(&self, link: &str) -> bool {
        if link.contains('#') {
            trace!("Skipping fragment link: {}", link);
            return false;
        }

        let internal = self.is_internal(link);
        if !internal {
            trace!("Skipping link outside the crawl scope: {}", link);
        }
        internal
    }

    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }
}
