use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, Deserialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::browser::{RenderSession, RenderedPage, Renderer};
use crate::cli::config::BrowserServiceSettings;
use crate::error::RenderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserServiceRequest {
    pub url: String,
    pub wait_for: String,
    pub take_screenshot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserServiceResponse {
    pub success: bool,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub links: Vec<String>,
    pub error: Option<String>,
}

/// Renders pages by delegating to an external browser service
pub struct RemoteBrowserRenderer {
    config: BrowserServiceSettings,
}

impl RemoteBrowserRenderer {
    pub fn new(config: BrowserServiceSettings) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Renderer for RemoteBrowserRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout))
            .build()?;

        Ok(Box::new(RemoteBrowserService {
            client,
            base_url: self.config.url.trim_end_matches('/').to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

pub struct RemoteBrowserService {
    client: Client,
    base_url: String,
}

#[async_trait]
impl RenderSession for RemoteBrowserService {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let endpoint = format!("{}/crawl", self.base_url);

        let request = BrowserServiceRequest {
            url: url.to_string(),
            wait_for: "body".to_string(),
            take_screenshot: false,
        };

        debug!("Sending request to browser service: {}", url);

        let response = self.client.post(&endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RenderError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let response = response.json::<BrowserServiceResponse>().await?;

        if !response.success {
            let message = response.error
                .unwrap_or_else(|| "crawl failed with unknown error".to_string());
            error!("Browser service error for {}: {}", url, message);
            return Err(RenderError::Service(message));
        }

        // The service may hand back relative hrefs
        let base = Url::parse(url).ok();
        let links = response.links.iter()
            .filter_map(|link| match Url::parse(link) {
                Ok(absolute) => Some(absolute.to_string()),
                Err(_) => base.as_ref()?.join(link).ok().map(|u| u.to_string()),
            })
            .collect();

        debug!("Successfully rendered URL: {}", url);

        Ok(RenderedPage {
            title: response.title,
            content: response.content,
            links,
        })
    }

    async fn close(&self) -> Result<(), RenderError> {
        Ok(())
    }

    fn max_concurrency(&self) -> usize {
        8
    }
}
