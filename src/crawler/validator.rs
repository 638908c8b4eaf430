use regex::Regex;
use tracing::debug;
use url::Url;

use crate::crawler::task::CrawlRequest;
use crate::error::ConfigError;

/// A crawl request that passed validation, with its patterns compiled
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    seed_url: String,
    parsed_seed: Url,
    seed_host: String,
    patterns: Vec<Regex>,
    depth: u32,
}

impl ValidatedRequest {
    /// Seed exactly as the caller wrote it
    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn parsed_seed(&self) -> &Url {
        &self.parsed_seed
    }

    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Check a crawl request and compile its path patterns.
///
/// Pure: the same request always yields the same outcome.
pub fn validate(request: &CrawlRequest) -> Result<ValidatedRequest, ConfigError> {
    let parsed_seed = Url::parse(&request.seed_url).map_err(|e| ConfigError::InvalidSeedUrl {
        url: request.seed_url.clone(),
        reason: e.to_string(),
    })?;

    let seed_host = match parsed_seed.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            return Err(ConfigError::InvalidSeedUrl {
                url: request.seed_url.clone(),
                reason: "URL has no host".to_string(),
            })
        }
    };

    let mut patterns = Vec::with_capacity(request.path_patterns.len());
    for pattern in &request.path_patterns {
        check_pattern_host(pattern, &seed_host)?;

        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        patterns.push(regex);
    }

    debug!(
        "Validated crawl of {} with {} pattern(s), depth {}",
        parsed_seed,
        patterns.len(),
        request.effective_depth()
    );

    Ok(ValidatedRequest {
        seed_url: request.seed_url.clone(),
        parsed_seed,
        seed_host,
        patterns,
        depth: request.effective_depth(),
    })
}

/// Characters that can't appear in a host but do appear in regexes
const REGEX_META: &[char] = &['\\', '^', '$', '*', '+', '?', '(', ')', '{', '}', '|'];

/// Reject a pattern written as an absolute URL on another host.
/// Anything that isn't an absolute URL is a path fragment and passes.
fn check_pattern_host(pattern: &str, seed_host: &str) -> Result<(), ConfigError> {
    if !has_literal_authority(pattern) {
        return Ok(());
    }

    let Ok(parsed) = Url::parse(pattern) else {
        return Ok(());
    };

    match parsed.host_str() {
        Some(host) if !host.is_empty() && host != seed_host => {
            Err(ConfigError::PatternDomainMismatch {
                pattern: pattern.to_string(),
                pattern_host: host.to_string(),
                seed_host: seed_host.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// True when the text between `://` and the path is a plain authority.
/// `Url::parse` reads `\` as `/`, which would cut `site\.com` down to `site`.
fn has_literal_authority(pattern: &str) -> bool {
    let Some((_, rest)) = pattern.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    !authority.contains(REGEX_META)
}
