use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug, error};

use crate::crawler::ledger::UrlPolicy;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KrawlConfig {
    pub crawler: CrawlerSettings,
    pub browser: BrowserSettings,
    pub browser_service: BrowserServiceSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

/// Crawler-specific settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CrawlerSettings {
    pub max_depth: i32,
    pub path_patterns: Vec<String>,
    pub timeout_minutes: u64,
    pub concurrency: usize,
    pub politeness_delay: u64,  // Delay before each render in milliseconds
    pub max_pages: usize,       // 0 means no limit
    pub url_policy: UrlPolicy,
}

/// Which renderer backs the crawl
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Local WebDriver endpoint (chromedriver, geckodriver, selenium)
    Webdriver,
    /// External browser service speaking the /crawl JSON API
    Remote,
    /// Plain HTTP fetch with static HTML parsing
    Http,
}

/// Browser settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrowserSettings {
    pub renderer: RendererKind,
    pub webdriver_url: String,
    pub headless: bool,
    pub page_load_timeout: u64,  // Seconds
    pub wait_timeout: u64,       // Seconds to wait for the body element
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrowserServiceSettings {
    pub url: String,
    pub request_timeout: u64,  // Seconds
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub request_timeout: u64,  // Seconds
    pub user_agent: String,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            max_depth: 3,
            path_patterns: vec![],
            timeout_minutes: 60,
            concurrency: 1,
            politeness_delay: 0,
            max_pages: 0,
            url_policy: UrlPolicy::Exact,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Webdriver,
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            page_load_timeout: 30,
            wait_timeout: 10,
            user_agent: None,
            proxy: None,
        }
    }
}

impl Default for BrowserServiceSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            request_timeout: 120,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            user_agent: format!("krawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for KrawlConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerSettings::default(),
            browser: BrowserSettings::default(),
            browser_service: BrowserServiceSettings::default(),
            http: HttpSettings::default(),
        }
    }
}

impl KrawlConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "krawl", "krawl") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    fn sites_dir() -> PathBuf {
        let path = Self::config_dir().join("sites");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }
        path
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_dir().join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::sites_dir().join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let mut config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables win over file contents
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("BROWSER_SERVICE_URL") {
            if !url.is_empty() {
                self.browser_service.url = url;
            }
        }
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_path = Self::config_dir().join("default.yaml");
        self.save_to_file(&config_path)
    }

    /// Save the configuration as a profile
    pub fn save_as_profile(&self, profile: &str) -> Result<()> {
        let profile_path = Self::sites_dir().join(format!("{}.yaml", profile));
        self.save_to_file(&profile_path)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let sites_dir = Self::sites_dir();

        if !sites_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(sites_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}
