//! Depth-bounded, same-site crawling.
//!
//! A crawl starts at a seed page, follows links on the seed's host (optionally
//! only those matching a set of regular expressions) for a bounded number of
//! generations, and returns the title and text of every page it visited.
//! Pages are produced by a [`browser::Renderer`]; the crawler itself only
//! decides what to visit and when to stop.

pub mod browser;
pub mod cli;
pub mod crawler;
pub mod error;
pub mod utils;

pub use browser::{RenderSession, RenderedPage, Renderer};
pub use crawler::{CrawlReport, CrawlRequest, CrawlStatus, PageRecord, Runner};
pub use error::{ConfigError, CrawlError, RenderError};
