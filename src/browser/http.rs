use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::browser::{RenderSession, RenderedPage, Renderer};
use crate::cli::config::HttpSettings;
use crate::error::RenderError;

/// Renders pages from their static HTML, without running scripts
pub struct HttpRenderer {
    config: HttpSettings,
}

impl HttpRenderer {
    pub fn new(config: HttpSettings) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout))
            .user_agent(self.config.user_agent.clone())
            .cookie_store(true)
            .build()?;

        Ok(Box::new(HttpSession { client }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub struct HttpSession {
    client: Client,
}

#[async_trait]
impl RenderSession for HttpSession {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let response = self.client.get(url).send().await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RenderError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Relative links resolve against where we ended up after redirects
        let final_url = response.url().clone();
        let html = response.text().await?;

        let page = parse_page(&html, &final_url);
        debug!("Parsed {} link(s) from {}", page.links.len(), url);

        Ok(page)
    }

    async fn close(&self) -> Result<(), RenderError> {
        Ok(())
    }

    fn max_concurrency(&self) -> usize {
        16
    }
}

/// Pull title, body text and absolute links out of an HTML document
pub fn parse_page(html: &str, base: &Url) -> RenderedPage {
    let document = Html::parse_document(html);

    let title = select_text(&document, "title");
    let content = select_text(&document, "body");

    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(link) = element.value().attr("href").and_then(|href| resolve_link(base, href)) {
                links.push(link);
            }
        }
    }

    RenderedPage {
        title,
        content,
        links,
    }
}

/// Whitespace-collapsed text of the first element matching `selector`
fn select_text(document: &Html, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };

    document.select(&selector)
        .next()
        .map(|element| {
            element.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Resolves a link (possibly relative) to an absolute URL
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    base.join(href).ok().map(|url| url.to_string())
}
