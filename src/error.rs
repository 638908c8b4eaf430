use thiserror::Error;

use crate::crawler::task::PageRecord;

/// Problems with a crawl request, detected before any page is rendered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeedUrl { url: String, reason: String },

    #[error("domain '{pattern_host}' in pattern '{pattern}' does not match seed domain '{seed_host}'")]
    PatternDomainMismatch {
        pattern: String,
        pattern_host: String,
        seed_host: String,
    },

    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Failure reported by a page renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer session error: {0}")]
    Session(String),

    #[error("failed to navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("failed to extract content from {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("browser service error: {0}")]
    Service(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Terminal outcome of a crawl that did not complete normally
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to render {url}: {source}")]
    Render {
        url: String,
        #[source]
        source: RenderError,
    },

    #[error("failed to open renderer session: {0}")]
    Session(#[source] RenderError),

    #[error("crawl deadline elapsed after collecting {} page(s)", pages.len())]
    Timeout { pages: Vec<PageRecord> },

    #[error("crawl runtime error: {0}")]
    Runtime(String),
}

impl CrawlError {
    /// Pages collected before the error, if any survived it
    pub fn partial_pages(&self) -> &[PageRecord] {
        match self {
            CrawlError::Timeout { pages } => pages,
            _ => &[],
        }
    }
}
