use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ping_executor::ProberKind;

/// Upper bound on `best_of`: one icmp sequence number per echo request.
pub const MAX_BEST_OF: u32 = u16::MAX as u32;

/// Most visited websites in the US, May 2021.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "google.com", "youtube.com", "facebook.com", "amazon.com", "wikipedia.org", "yahoo.com",
    "reddit.com", "pornhub.com", "instagram.com", "twitter.com", "ebay.com", "xvideos.com",
    "fandom.com", "cnn.com", "craigslist.org", "walmart.com", "weather.com", "xnxx.com",
    "espn.com", "imdb.com", "zoom.us", "foxnews.com", "linkedin.com", "bing.com",
    "microsoft.com", "live.com", "usps.com", "msn.com", "homedepot.com", "paypal.com",
    "xhamster.com", "indeed.com", "duckduckgo.com", "etsy.com", "zillow.com", "pinterest.com",
    "office.com", "nytimes.com", "twitch.tv", "quora.com", "accuweather.com", "apple.com",
    "netflix.com", "healthline.com", "target.com", "instructure.com", "bestbuy.com",
    "yelp.com", "att.com", "lowes.com", "ups.com", "t-mobile.com", "microsoftonline.com",
    "fedex.com", "washingtonpost.com", "realtor.com", "chase.com", "quizlet.com", "webmd.com",
    "github.com", "stackoverflow.com", "archiveofourown.org", "bbc.com", "wellsfargo.com",
    "xfinity.com", "aol.com", "chaturbate.com", "intuit.com", "tripadvisor.com",
    "cheatsheet.com", "nih.gov", "bankofamerica.com", "adobe.com", "wayfair.com",
    "weather.gov", "usatoday.com", "ca.gov", "cnbc.com", "allrecipes.com", "capitalone.com",
    "dailymail.co.uk", "samsung.com", "drudgereport.com", "hulu.com", "businessinsider.com",
    "roblox.com", "spankbang.com", "npr.org", "fidelity.com", "nypost.com", "pch.com",
    "onlyfans.com", "adp.com", "imgur.com", "mayoclinic.org", "costco.com", "youporn.com",
    "theguardian.com", "marketwatch.com", "ign.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Order matters: servers are paired across providers by position.
    pub servers: Vec<String>,
}

impl ProviderConfig {
    pub fn new(name: &str, servers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            servers: servers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub providers: Vec<ProviderConfig>,
    pub domains: Vec<String>,
    /// How many of `domains` to measure, from the front.
    pub num_domains: usize,
    pub best_of: u32,
    /// `None` runs every measurement at once.
    pub max_in_flight: Option<usize>,
    pub prober: ProberKind,
    pub resolver_program: String,
    pub ping_program: String,
    pub icmp_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderConfig::new("cloudflare", &["1.1.1.1", "1.0.0.1"]),
                ProviderConfig::new("google", &["8.8.8.8", "8.8.4.4"]),
            ],
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            num_domains: DEFAULT_DOMAINS.len(),
            best_of: 3,
            max_in_flight: Some(50),
            prober: ProberKind::External,
            resolver_program: "dig".to_string(),
            ping_program: "ping".to_string(),
            icmp_timeout_ms: 1000,
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("DnsCompare");
        Ok(config_dir.join("config.json"))
    }

    /// Read the config from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::get_config_path()
            .ok()
            .filter(|path| path.exists())
            .and_then(|path| match Self::from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("ignoring {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.servers.is_empty() {
                return Err(ConfigError::EmptyProvider(provider.name.clone()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
        }
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if !seen.insert(domain.as_str()) {
                return Err(ConfigError::DuplicateDomain(domain.clone()));
            }
        }
        if self.num_domains == 0 || self.num_domains > self.domains.len() {
            return Err(ConfigError::DomainCount {
                requested: self.num_domains,
                available: self.domains.len(),
            });
        }
        if self.best_of == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.best_of > MAX_BEST_OF {
            return Err(ConfigError::CountTooLarge {
                requested: self.best_of,
                max: MAX_BEST_OF,
            });
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }

    /// The measured prefix of `domains`.
    pub fn selected_domains(&self) -> &[String] {
        &self.domains[..self.num_domains.min(self.domains.len())]
    }

    pub fn icmp_timeout(&self) -> Duration {
        Duration::from_millis(self.icmp_timeout_ms)
    }
}
