use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::RenderSession;
use crate::cli::config::CrawlerSettings;
use crate::crawler::ledger::VisitLedger;
use crate::crawler::scheduler::LinkClassifier;
use crate::crawler::task::{CrawlReport, CrawlStatus, CrawlTask, PageFailure, PageRecord};
use crate::crawler::validator::ValidatedRequest;
use crate::error::CrawlError;
use crate::utils::metrics::{CrawlStats, RequestTimer};

/// Stand-in for a time budget too large to add to the clock (thirty years)
const UNBOUNDED_TIMEOUT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Drives the traversal of one crawl.
///
/// The frontier is a stack and URLs are claimed when popped, so with a
/// concurrency of one pages are visited in depth-first pre-order, siblings in
/// the order they appear on their page. With more concurrency pages are
/// recorded in completion order.
pub struct CrawlerController {
    config: CrawlerSettings,
}

impl CrawlerController {
    /// Create a new crawler controller with the given settings
    pub fn new(config: CrawlerSettings) -> Self {
        Self { config }
    }

    /// Overall time budget for one crawl
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_minutes.saturating_mul(60))
    }

    /// Deadline for a crawl starting at `start`. A budget past what the
    /// clock can represent is capped at a far-off instant.
    pub fn deadline_from(&self, start: Instant) -> Instant {
        start.checked_add(self.timeout())
            .or_else(|| start.checked_add(UNBOUNDED_TIMEOUT))
            .unwrap_or(start)
    }

    /// Crawl from the request's seed until the frontier drains, the page
    /// limit is hit or `deadline` passes.
    ///
    /// Render failures below the seed are recorded and skipped. A failure to
    /// render the seed itself is returned as an error.
    pub async fn crawl(
        &self,
        session: &dyn RenderSession,
        request: &ValidatedRequest,
        deadline: Instant,
    ) -> Result<CrawlReport, CrawlError> {
        let crawl_id = Uuid::new_v4();
        let span = info_span!("crawl", %crawl_id, seed = %request.seed_url());

        self.run_frontier(crawl_id, session, request, deadline)
            .instrument(span)
            .await
    }

    async fn run_frontier(
        &self,
        crawl_id: Uuid,
        session: &dyn RenderSession,
        request: &ValidatedRequest,
        deadline: Instant,
    ) -> Result<CrawlReport, CrawlError> {
        let classifier = LinkClassifier::from_request(request);
        let ledger = VisitLedger::new(self.config.url_policy);
        let parallelism = self.config.concurrency.max(1).min(session.max_concurrency().max(1));
        let politeness = Duration::from_millis(self.config.politeness_delay);

        info!(
            "Starting crawl of {} (depth {}, {} pattern(s), parallelism {})",
            request.seed_url(),
            request.depth(),
            request.patterns().len(),
            parallelism
        );
        debug!(host = classifier.seed_host(), policy = ?ledger.policy(), "Frontier ready");

        let mut stats = CrawlStats::default();
        let mut pages = Vec::new();
        let mut failures = Vec::new();
        let mut status = CrawlStatus::Completed;

        let mut frontier = vec![CrawlTask::seed(request.seed_url(), request.depth())];
        let mut in_flight = FuturesUnordered::new();

        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            while in_flight.len() < parallelism && !self.page_limit_reached(&stats, in_flight.len()) {
                let Some(task) = frontier.pop() else {
                    break;
                };

                if task.depth_remaining == 0 {
                    stats.depth_exhausted += 1;
                    continue;
                }

                if !ledger.try_claim(&task.url).await {
                    stats.duplicates_skipped += 1;
                    continue;
                }

                in_flight.push(async move {
                    if !politeness.is_zero() {
                        sleep(politeness).await;
                    }
                    let timer = RequestTimer::start();
                    let result = session.render(&task.url).await;
                    (task, result, timer.end())
                });
            }

            if in_flight.is_empty() {
                if Self::withholds_work(&mut frontier, &ledger, &mut stats).await {
                    info!("Page limit of {} reached", self.config.max_pages);
                    status = CrawlStatus::PageLimitReached;
                }
                break;
            }

            tokio::select! {
                _ = &mut expiry => {
                    warn!(
                        "Crawl deadline reached with {} render(s) in flight; returning {} page(s)",
                        in_flight.len(),
                        pages.len()
                    );
                    status = CrawlStatus::TimedOut;
                    break;
                }
                Some((task, result, elapsed_ms)) = in_flight.next() => {
                    match result {
                        Ok(page) => {
                            stats.record_render(true, elapsed_ms);
                            debug!("Rendered {} [depth {}] in {} ms", task.url, task.depth_remaining, elapsed_ms);

                            // Reversed so the first link on the page is popped first
                            let mut children = Vec::new();
                            for link in &page.links {
                                if classifier.should_follow(link) {
                                    children.push(task.child(link.as_str()));
                                } else {
                                    stats.links_filtered += 1;
                                }
                            }
                            stats.links_scheduled += children.len();
                            frontier.extend(children.into_iter().rev());

                            pages.push(PageRecord {
                                url: task.url,
                                title: page.title,
                                content: page.content,
                                depth: task.depth_remaining,
                                rendered_at: Utc::now(),
                            });
                        }
                        Err(error) => {
                            stats.record_render(false, elapsed_ms);

                            if task.is_seed() {
                                return Err(CrawlError::Render { url: task.url, source: error });
                            }

                            warn!("Error crawling {}: {}", task.url, error);
                            failures.push(PageFailure {
                                url: task.url,
                                parent_url: task.parent_url,
                                depth: task.depth_remaining,
                                error: error.to_string(),
                                occurred_at: Utc::now(),
                            });
                        }
                    }
                }
            }
        }

        // Dropping the remaining futures cancels their renders
        drop(in_flight);
        stats.finish();

        info!(
            "Crawl finished: {} page(s), {} failure(s), {} duplicate(s) skipped, avg render {} ms",
            pages.len(),
            failures.len(),
            stats.duplicates_skipped,
            stats.average_render_ms()
        );

        Ok(CrawlReport {
            crawl_id,
            seed_url: request.seed_url().to_string(),
            status,
            pages,
            failures,
            stats,
        })
    }

    /// Drain what the page limit left behind; true if any of it would
    /// still have been rendered.
    async fn withholds_work(
        frontier: &mut Vec<CrawlTask>,
        ledger: &VisitLedger,
        stats: &mut CrawlStats,
    ) -> bool {
        while let Some(task) = frontier.pop() {
            if task.depth_remaining == 0 {
                stats.depth_exhausted += 1;
            } else if ledger.contains(&task.url).await {
                stats.duplicates_skipped += 1;
            } else {
                return true;
            }
        }
        false
    }

    fn page_limit_reached(&self, stats: &CrawlStats, in_flight: usize) -> bool {
        self.config.max_pages > 0 && stats.pages_rendered + in_flight >= self.config.max_pages
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::RenderedPage;
    use crate::crawler::task::CrawlRequest;
    use crate::crawler::validator::validate;
    use crate::error::RenderError;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory site: URL -> (title, links). Unknown URLs fail to render.
    pub(crate) struct FakeSite {
        pages: HashMap<String, (String, Vec<String>)>,
        failing: HashSet<String>,
        delay: Duration,
        concurrency: usize,
        pub(crate) rendered: Mutex<Vec<String>>,
    }

    impl FakeSite {
        pub(crate) fn new() -> Self {
            Self {
                pages: HashMap::new(),
                failing: HashSet::new(),
                delay: Duration::ZERO,
                concurrency: 1,
                rendered: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn page(mut self, url: &str, links: &[&str]) -> Self {
            let title = format!("Title of {}", url);
            let links = links.iter().map(|l| l.to_string()).collect();
            self.pages.insert(url.to_string(), (title, links));
            self
        }

        pub(crate) fn failing(mut self, url: &str) -> Self {
            self.failing.insert(url.to_string());
            self
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn with_concurrency(mut self, concurrency: usize) -> Self {
            self.concurrency = concurrency;
            self
        }

        pub(crate) fn rendered(&self) -> Vec<String> {
            self.rendered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderSession for FakeSite {
        async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
            self.rendered.lock().unwrap().push(url.to_string());
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            if self.failing.contains(url) {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }

            match self.pages.get(url) {
                Some((title, links)) => Ok(RenderedPage {
                    title: title.clone(),
                    content: format!("Body of {}", url),
                    links: links.clone(),
                }),
                None => Err(RenderError::Http {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }

        async fn close(&self) -> Result<(), RenderError> {
            Ok(())
        }

        fn max_concurrency(&self) -> usize {
            self.concurrency
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    async fn crawl(site: &FakeSite, request: CrawlRequest, settings: CrawlerSettings) -> CrawlReport {
        let validated = validate(&request).unwrap();
        CrawlerController::new(settings)
            .crawl(site, &validated, far_deadline())
            .await
            .unwrap()
    }

    fn urls(report: &CrawlReport) -> Vec<&str> {
        report.pages.iter().map(|p| p.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cycles_visit_each_page_once() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/a", "https://site.com/b"])
            .page("https://site.com/a", &["https://site.com/", "https://site.com/b", "https://site.com/a"])
            .page("https://site.com/b", &["https://site.com/a", "https://site.com/"]);

        let request = CrawlRequest::new("https://site.com/").with_depth(10);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/", "https://site.com/a", "https://site.com/b"]);
        assert_eq!(site.rendered().len(), 3);
        assert_eq!(report.status, CrawlStatus::Completed);
        assert!(report.stats.duplicates_skipped > 0);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/1"])
            .page("https://site.com/1", &["https://site.com/2"])
            .page("https://site.com/2", &["https://site.com/3"])
            .page("https://site.com/3", &["https://site.com/4"])
            .page("https://site.com/4", &[]);

        let request = CrawlRequest::new("https://site.com/").with_depth(3);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/", "https://site.com/1", "https://site.com/2"]);
        assert_eq!(report.pages[0].depth, 3);
        assert_eq!(report.pages[2].depth, 1);
        assert!(!site.rendered().contains(&"https://site.com/3".to_string()));
    }

    #[tokio::test]
    async fn test_default_depth_applies() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/1"])
            .page("https://site.com/1", &["https://site.com/2"])
            .page("https://site.com/2", &["https://site.com/3"])
            .page("https://site.com/3", &[]);

        let request = CrawlRequest::new("https://site.com/").with_depth(0);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(report.pages.len(), 3);
    }

    #[tokio::test]
    async fn test_external_links_never_followed() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://other.com/", "https://site.com/blog/x"])
            .page("https://site.com/blog/x", &[])
            .page("https://other.com/", &[]);

        let request = CrawlRequest::new("https://site.com/").with_patterns([".*"]);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/", "https://site.com/blog/x"]);
        assert!(!site.rendered().iter().any(|u| u.contains("other.com")));
    }

    #[tokio::test]
    async fn test_patterns_restrict_followed_links() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/about", "https://site.com/blog/post-1"])
            .page("https://site.com/about", &[])
            .page("https://site.com/blog/post-1", &[]);

        let request = CrawlRequest::new("https://site.com/").with_patterns(["/blog/.*"]);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/", "https://site.com/blog/post-1"]);
        assert_eq!(report.stats.links_filtered, 1);
    }

    #[tokio::test]
    async fn test_fragment_links_never_visited() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/page#section", "https://site.com/other#top"])
            .page("https://site.com/page#section", &[])
            .page("https://site.com/other#top", &[]);

        let request = CrawlRequest::new("https://site.com/");
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/"]);
        assert_eq!(site.rendered(), vec!["https://site.com/".to_string()]);
    }

    #[tokio::test]
    async fn test_child_failure_keeps_parent_and_siblings() {
        let site = FakeSite::new()
            .page("https://site.com/a", &["https://site.com/b", "https://site.com/c"])
            .failing("https://site.com/b")
            .page("https://site.com/c", &[]);

        let request = CrawlRequest::new("https://site.com/a");
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(urls(&report), vec!["https://site.com/a", "https://site.com/c"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, "https://site.com/b");
        assert_eq!(report.failures[0].parent_url.as_deref(), Some("https://site.com/a"));
        assert_eq!(report.status, CrawlStatus::Completed);
    }

    #[tokio::test]
    async fn test_seed_failure_is_returned() {
        let site = FakeSite::new().failing("https://site.com/");
        let validated = validate(&CrawlRequest::new("https://site.com/")).unwrap();

        let err = CrawlerController::new(CrawlerSettings::default())
            .crawl(&site, &validated, far_deadline())
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Render { ref url, .. } if url == "https://site.com/"));
    }

    #[tokio::test]
    async fn test_sequential_crawl_is_depth_first() {
        let site = FakeSite::new()
            .page("https://site.com/a", &["https://site.com/b", "https://site.com/c"])
            .page("https://site.com/b", &["https://site.com/d", "https://site.com/c"])
            .page("https://site.com/c", &[])
            .page("https://site.com/d", &[]);

        let request = CrawlRequest::new("https://site.com/a").with_depth(5);
        let report = crawl(&site, request, CrawlerSettings::default()).await;

        assert_eq!(
            urls(&report),
            vec!["https://site.com/a", "https://site.com/b", "https://site.com/d", "https://site.com/c"]
        );
    }

    #[tokio::test]
    async fn test_parallel_crawl_visits_each_page_once() {
        let mut site = FakeSite::new().with_concurrency(4).with_delay(Duration::from_millis(5));
        let hub: Vec<String> = (0..12).map(|i| format!("https://site.com/p{}", i)).collect();
        let hub_refs: Vec<&str> = hub.iter().map(String::as_str).collect();
        site = site.page("https://site.com/", &hub_refs);
        for url in &hub {
            site = site.page(url, &hub_refs);
        }

        let settings = CrawlerSettings {
            concurrency: 4,
            ..CrawlerSettings::default()
        };
        let request = CrawlRequest::new("https://site.com/").with_depth(4);
        let report = crawl(&site, request, settings).await;

        let visited: HashSet<&str> = urls(&report).into_iter().collect();
        assert_eq!(report.pages.len(), 13);
        assert_eq!(visited.len(), 13);
        assert_eq!(site.rendered().len(), 13);
    }

    #[tokio::test]
    async fn test_deadline_returns_partial_pages() {
        let mut site = FakeSite::new().with_delay(Duration::from_millis(40));
        for i in 0..200 {
            let next = format!("https://site.com/{}", i + 1);
            site = site.page(&format!("https://site.com/{}", i), &[next.as_str()]);
        }

        let validated = validate(&CrawlRequest::new("https://site.com/0").with_depth(1000)).unwrap();
        let deadline = Instant::now() + Duration::from_millis(300);
        let report = CrawlerController::new(CrawlerSettings::default())
            .crawl(&site, &validated, deadline)
            .await
            .unwrap();

        assert_eq!(report.status, CrawlStatus::TimedOut);
        assert!(!report.pages.is_empty());
        assert!(report.pages.len() < 200);
        assert_eq!(report.pages[0].url, "https://site.com/0");
    }

    #[tokio::test]
    async fn test_page_limit() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/a", "https://site.com/b"])
            .page("https://site.com/a", &[])
            .page("https://site.com/b", &[]);

        let settings = CrawlerSettings {
            max_pages: 2,
            ..CrawlerSettings::default()
        };
        let report = crawl(&site, CrawlRequest::new("https://site.com/"), settings).await;

        assert_eq!(urls(&report), vec!["https://site.com/", "https://site.com/a"]);
        assert_eq!(report.status, CrawlStatus::PageLimitReached);
    }

    #[tokio::test]
    async fn test_page_limit_with_only_exhausted_links_completes() {
        // Children sit at depth zero, so the limit holds nothing back
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/a", "https://site.com/"]);

        let settings = CrawlerSettings {
            max_pages: 1,
            ..CrawlerSettings::default()
        };
        let report = crawl(&site, CrawlRequest::new("https://site.com/").with_depth(1), settings).await;

        assert_eq!(urls(&report), vec!["https://site.com/"]);
        assert_eq!(report.status, CrawlStatus::Completed);
        assert_eq!(report.stats.depth_exhausted, 2);
    }

    #[tokio::test]
    async fn test_page_limit_with_only_visited_links_completes() {
        let site = FakeSite::new()
            .page("https://site.com/", &["https://site.com/", "https://site.com/"]);

        let settings = CrawlerSettings {
            max_pages: 1,
            ..CrawlerSettings::default()
        };
        let report = crawl(&site, CrawlRequest::new("https://site.com/"), settings).await;

        assert_eq!(report.status, CrawlStatus::Completed);
        assert_eq!(report.stats.duplicates_skipped, 2);
    }

    #[test]
    fn test_deadline_survives_huge_timeout() {
        let controller = CrawlerController::new(CrawlerSettings {
            timeout_minutes: u64::MAX,
            ..CrawlerSettings::default()
        });

        let start = Instant::now();
        let deadline = controller.deadline_from(start);
        assert!(deadline > start + Duration::from_secs(365 * 24 * 60 * 60));
    }

    #[test]
    fn test_deadline_from_configured_minutes() {
        let controller = CrawlerController::new(CrawlerSettings {
            timeout_minutes: 2,
            ..CrawlerSettings::default()
        });

        let start = Instant::now();
        assert_eq!(controller.deadline_from(start), start + Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_canonical_policy_merges_trailing_slash() {
        let site = FakeSite::new()
            .page("https://site.com/docs", &["https://site.com/docs/"])
            .page("https://site.com/docs/", &[]);

        let settings = CrawlerSettings {
            url_policy: crate::crawler::ledger::UrlPolicy::Canonical,
            ..CrawlerSettings::default()
        };
        let report = crawl(&site, CrawlRequest::new("https://site.com/docs"), settings).await;

        assert_eq!(urls(&report), vec!["https://site.com/docs"]);
    }
}
