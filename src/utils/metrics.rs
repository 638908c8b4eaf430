use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Counters collected over one crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Start time of the crawl
    pub started_at: DateTime<Utc>,

    /// Pages rendered successfully
    pub pages_rendered: usize,

    /// Renders that failed
    pub pages_failed: usize,

    /// Frontier entries dropped because the URL was already claimed
    pub duplicates_skipped: usize,

    /// Frontier entries dropped because no depth was left
    pub depth_exhausted: usize,

    /// Outbound links that did not qualify for following
    pub links_filtered: usize,

    /// Outbound links scheduled onto the frontier
    pub links_scheduled: usize,

    /// Sum of render durations in milliseconds
    pub render_time_ms: u64,

    /// Wall-clock duration of the crawl in milliseconds
    pub elapsed_ms: u64,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            pages_rendered: 0,
            pages_failed: 0,
            duplicates_skipped: 0,
            depth_exhausted: 0,
            links_filtered: 0,
            links_scheduled: 0,
            render_time_ms: 0,
            elapsed_ms: 0,
        }
    }
}

impl CrawlStats {
    /// Record a finished render
    pub fn record_render(&mut self, success: bool, duration_ms: u64) {
        if success {
            self.pages_rendered += 1;
        } else {
            self.pages_failed += 1;
        }
        self.render_time_ms += duration_ms;
    }

    /// Average render time over every attempt
    pub fn average_render_ms(&self) -> u64 {
        let attempts = (self.pages_rendered + self.pages_failed) as u64;
        if attempts == 0 {
            0
        } else {
            self.render_time_ms / attempts
        }
    }

    /// Close the books at the end of a crawl
    pub fn finish(&mut self) {
        self.elapsed_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
    }
}

/// Request timer for measuring render durations
pub struct RequestTimer {
    /// Start time of the request
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
