use anyhow::{Result, Context};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::browser::{HttpRenderer, RemoteBrowserRenderer, Renderer, WebDriverRenderer};
use crate::cli::config::{KrawlConfig, RendererKind};
use crate::cli::CrawlArgs;
use crate::crawler::{CrawlReport, CrawlRequest, CrawlStatus, Runner};

/// Crawl a site and emit the report
pub async fn crawl(args: CrawlArgs) -> Result<()> {
    let config = match &args.profile {
        Some(profile) => KrawlConfig::load_profile(profile)
            .context(format!("Failed to load profile: {}", profile))?,
        None => KrawlConfig::load_default()?,
    };
    let config = apply_overrides(config, &args);

    let request = build_request(&args, &config);
    let renderer = build_renderer(&config);

    let runner = Runner::new(config.crawler.clone(), renderer);
    let report = runner.run(&request).await
        .context(format!("Crawl of {} failed", request.seed_url))?;

    match report.status {
        CrawlStatus::Completed => info!("Crawl completed with {} page(s)", report.pages.len()),
        CrawlStatus::PageLimitReached => info!("Crawl stopped at the page limit with {} page(s)", report.pages.len()),
        CrawlStatus::TimedOut => warn!("Crawl timed out; report holds {} page(s) collected so far", report.pages.len()),
    }

    if !report.failures.is_empty() {
        warn!("{} page(s) could not be rendered", report.failures.len());
    }

    write_report(&report, args.output.as_deref()).await
}

/// Command line values win over the loaded configuration
fn apply_overrides(mut config: KrawlConfig, args: &CrawlArgs) -> KrawlConfig {
    if let Some(depth) = args.depth {
        config.crawler.max_depth = depth;
    }

    if !args.patterns.is_empty() {
        config.crawler.path_patterns = args.patterns.clone();
    }

    if let Some(renderer) = args.renderer {
        config.browser.renderer = renderer;
    }

    if let Some(concurrency) = args.concurrency {
        config.crawler.concurrency = concurrency;
    }

    if let Some(minutes) = args.timeout_minutes {
        config.crawler.timeout_minutes = minutes;
    }

    config
}

fn build_request(args: &CrawlArgs, config: &KrawlConfig) -> CrawlRequest {
    CrawlRequest::new(args.url.clone())
        .with_patterns(config.crawler.path_patterns.clone())
        .with_depth(config.crawler.max_depth)
}

fn build_renderer(config: &KrawlConfig) -> Arc<dyn Renderer> {
    match config.browser.renderer {
        RendererKind::Webdriver => Arc::new(WebDriverRenderer::new(config.browser.clone())),
        RendererKind::Remote => Arc::new(RemoteBrowserRenderer::new(config.browser_service.clone())),
        RendererKind::Http => Arc::new(HttpRenderer::new(config.http.clone())),
    }
}

async fn write_report(report: &CrawlReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize crawl report")?;

    match output {
        Some(path) => {
            tokio::fs::write(path, json).await
                .context(format!("Failed to write report to: {}", path.display()))?;
            info!("Report written to: {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = KrawlConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show a profile, creating it with defaults if missing
pub fn manage_profile(profile_name: String) -> Result<()> {
    match KrawlConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{}", serde_yaml::to_string(&config)?);
        },
        Err(_) => {
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let config = KrawlConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = KrawlConfig::load_default()?;
    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str) -> CrawlArgs {
        CrawlArgs {
            url: url.to_string(),
            patterns: vec![],
            depth: None,
            profile: None,
            renderer: None,
            concurrency: None,
            timeout_minutes: None,
            output: None,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = KrawlConfig::default();
        config.crawler.path_patterns = vec!["/docs/.*".to_string()];

        let mut cli = args("https://site.com");
        cli.depth = Some(5);
        cli.patterns = vec!["/blog/.*".to_string()];
        cli.renderer = Some(RendererKind::Remote);
        cli.timeout_minutes = Some(2);

        let config = apply_overrides(config, &cli);
        let request = build_request(&cli, &config);

        assert_eq!(request.max_depth, 5);
        assert_eq!(request.path_patterns, vec!["/blog/.*".to_string()]);
        assert_eq!(config.browser.renderer, RendererKind::Remote);
        assert_eq!(config.crawler.timeout_minutes, 2);
        assert_eq!(build_renderer(&config).name(), "remote");
    }

    #[test]
    fn test_config_patterns_used_without_cli_patterns() {
        let mut config = KrawlConfig::default();
        config.crawler.path_patterns = vec!["/docs/.*".to_string()];

        let cli = args("https://site.com");
        let config = apply_overrides(config, &cli);
        let request = build_request(&cli, &config);

        assert_eq!(request.path_patterns, vec!["/docs/.*".to_string()]);
        assert_eq!(request.effective_depth(), 3);
    }
}
