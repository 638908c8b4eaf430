use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrawlError;
use crate::utils::metrics::CrawlStats;

/// Depth used when the caller asks for less than one generation
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Parameters of one crawl invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Starting page; also the reference host for internal links
    pub seed_url: String,

    /// Regular expressions a followed link must match (any of them)
    #[serde(default)]
    pub path_patterns: Vec<String>,

    /// Generations to expand, seed included. Values below 1 mean the default
    #[serde(default)]
    pub max_depth: i32,
}

impl CrawlRequest {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            path_patterns: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH as i32,
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Depth after applying the default for non-positive values
    pub fn effective_depth(&self) -> u32 {
        if self.max_depth < 1 {
            DEFAULT_MAX_DEPTH
        } else {
            self.max_depth as u32
        }
    }
}

/// An entry on the crawl frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// URL to visit, exactly as discovered
    pub url: String,

    /// Generations left, this one included
    pub depth_remaining: u32,

    /// Page that linked here (None for the seed)
    pub parent_url: Option<String>,
}

impl CrawlTask {
    pub fn seed(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth_remaining: depth,
            parent_url: None,
        }
    }

    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth_remaining: self.depth_remaining.saturating_sub(1),
            parent_url: Some(self.url.clone()),
        }
    }

    pub fn is_seed(&self) -> bool {
        self.parent_url.is_none()
    }
}

/// Rendered output of one visited page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub content: String,

    /// Generations that were left when the page was visited
    pub depth: u32,

    pub rendered_at: DateTime<Utc>,
}

/// A branch abandoned because its page could not be rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFailure {
    pub url: String,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

/// How a crawl came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Every branch hit depth exhaustion, a duplicate or ran out of links
    Completed,
    /// The deadline elapsed; pages are what was collected before it
    TimedOut,
    /// The configured page limit stopped further rendering
    PageLimitReached,
}

/// Everything one crawl produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub crawl_id: Uuid,
    pub seed_url: String,
    pub status: CrawlStatus,
    pub pages: Vec<PageRecord>,
    pub failures: Vec<PageFailure>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.status == CrawlStatus::Completed
    }

    /// Collapse the report into the plain pages-or-error shape
    pub fn into_result(self) -> Result<Vec<PageRecord>, CrawlError> {
        match self.status {
            CrawlStatus::TimedOut => Err(CrawlError::Timeout { pages: self.pages }),
            CrawlStatus::Completed | CrawlStatus::PageLimitReached => Ok(self.pages),
        }
    }

    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.iter().find(|page| page.url == url)
    }
}
