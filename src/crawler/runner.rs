use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::browser::Renderer;
use crate::cli::config::CrawlerSettings;
use crate::crawler::controller::CrawlerController;
use crate::crawler::task::{CrawlReport, CrawlRequest};
use crate::crawler::validator::validate;
use crate::error::CrawlError;

/// Entry point for running a crawl end to end
pub struct Runner {
    config: CrawlerSettings,
    renderer: Arc<dyn Renderer>,
}

impl Runner {
    pub fn new(config: CrawlerSettings, renderer: Arc<dyn Renderer>) -> Self {
        Self { config, renderer }
    }

    /// Validate the request, open a renderer session, crawl and close the
    /// session again.
    ///
    /// An invalid request fails before the renderer is touched. The session
    /// is closed on every path once it has been opened.
    pub async fn run(&self, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let validated = validate(request)?;

        let controller = CrawlerController::new(self.config.clone());
        let deadline = controller.deadline_from(Instant::now());

        // A renderer that is cut off mid-open owns whatever it already
        // created; see `WebDriverRenderer::open_session`.
        info!("Opening {} renderer session", self.renderer.name());
        let session = match timeout_at(deadline, self.renderer.open_session()).await {
            Ok(session) => session.map_err(CrawlError::Session)?,
            Err(_) => return Err(CrawlError::Timeout { pages: Vec::new() }),
        };

        let result = controller.crawl(session.as_ref(), &validated, deadline).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close {} renderer session: {}", self.renderer.name(), e);
        }

        result
    }

    /// Run on a private runtime for callers that are not async
    pub fn run_blocking(&self, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CrawlError::Runtime(e.to_string()))?;

        runtime.block_on(self.run(request))
    }
}
