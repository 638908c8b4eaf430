//! Page renderers.
//!
//! The crawler only ever talks to [`Renderer`] and [`RenderSession`]; how a
//! page gets turned into text and links is up to the implementation.

pub mod http;
pub mod remote;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

// Re-export common types
pub use http::HttpRenderer;
pub use remote::RemoteBrowserRenderer;
pub use session::WebDriverRenderer;

/// What a renderer extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// Document title
    pub title: String,

    /// Visible text of the page body
    pub content: String,

    /// Absolute targets of the page's hyperlinks, in document order
    pub links: Vec<String>,
}

/// A rendering engine that hands out sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquire a session. The caller must close it when done.
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// A live session able to render pages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Navigate to `url`, wait for content and extract it
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;

    /// Release the session's resources
    async fn close(&self) -> Result<(), RenderError>;

    /// How many renders this session can run at once
    fn max_concurrency(&self) -> usize {
        1
    }
}
