use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::browser::{RenderSession, RenderedPage, Renderer};
use crate::cli::config::BrowserSettings;
use crate::error::RenderError;

/// Collects hyperlink targets as the browser resolved them
const LINKS_SCRIPT: &str =
    "return Array.from(document.querySelectorAll('a[href]')).map(a => a.href);";

/// Renders pages through a WebDriver endpoint
pub struct WebDriverRenderer {
    config: BrowserSettings,
}

impl WebDriverRenderer {
    pub fn new(config: BrowserSettings) -> Self {
        Self { config }
    }

    fn capabilities(&self) -> WebDriverResult<ChromeCapabilities> {
        let mut caps = DesiredCapabilities::chrome();

        if let Some(user_agent) = &self.config.user_agent {
            caps.add_chrome_arg(&format!("--user-agent={}", user_agent))?;
        }

        if let Some(proxy) = &self.config.proxy {
            caps.add_chrome_arg(&format!("--proxy-server={}", proxy))?;
        }

        if self.config.headless {
            caps.set_headless()?;
        }

        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        Ok(caps)
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let caps = self.capabilities()
            .map_err(|e| RenderError::Session(format!("invalid capabilities: {}", e)))?;

        let driver = WebDriver::new(&self.config.webdriver_url, caps).await
            .map_err(|e| RenderError::Session(format!(
                "failed to connect to WebDriver at {}: {}",
                self.config.webdriver_url, e
            )))?;

        // Owned from here on, so a cancelled open still quits the browser on drop.
        // A create request still in flight when cancelled can't be reclaimed.
        let session = BrowserSession {
            driver: Mutex::new(Some(driver)),
            wait_timeout: Duration::from_secs(self.config.wait_timeout),
        };

        session.configure(Duration::from_secs(self.config.page_load_timeout)).await?;

        info!("WebDriver session opened at {}", self.config.webdriver_url);

        Ok(Box::new(session))
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}

/// One browser window. Renders are serialized on it.
pub struct BrowserSession {
    driver: Mutex<Option<WebDriver>>,
    wait_timeout: Duration,
}

impl BrowserSession {
    async fn configure(&self, page_load_timeout: Duration) -> Result<(), RenderError> {
        let guard = self.driver.lock().await;
        let Some(driver) = guard.as_ref() else {
            return Ok(());
        };

        driver.set_page_load_timeout(page_load_timeout).await
            .map_err(|e| RenderError::Session(format!("failed to set page load timeout: {}", e)))
    }

    async fn extract(&self, driver: &WebDriver, url: &str) -> WebDriverResult<RenderedPage> {
        let body = driver.query(By::Tag("body"))
            .wait(self.wait_timeout, Duration::from_millis(250))
            .first()
            .await?;

        let title = driver.title().await?;
        let content = body.text().await?;
        let links: Vec<String> = driver.execute(LINKS_SCRIPT, Vec::new()).await?.convert()?;

        debug!("Extracted {} link(s) from {}", links.len(), url);

        Ok(RenderedPage {
            title,
            content,
            links,
        })
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let guard = self.driver.lock().await;
        let driver = guard.as_ref()
            .ok_or_else(|| RenderError::Session("browser session already closed".to_string()))?;

        debug!("Navigating to: {}", url);
        driver.goto(url).await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.extract(driver, url).await
            .map_err(|e| RenderError::Extraction {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), RenderError> {
        if let Some(driver) = self.driver.lock().await.take() {
            driver.quit().await
                .map_err(|e| RenderError::Session(format!("failed to quit browser: {}", e)))?;
            debug!("Browser session closed");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = driver.quit().await {
                            error!("Error closing browser session during drop: {}", e);
                        }
                    });
                }
                Err(_) => error!("Browser session dropped outside a runtime; window left open"),
            }
        }
    }
}
