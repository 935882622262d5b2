//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WALLARSS_*)
//! 2. TOML config file (if WALLARSS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Shared secret the marketplace API expects request signatures to be keyed with.
///
/// Used verbatim as the HMAC key bytes; it is not base64-decoded first.
pub const DEFAULT_SIGNING_KEY: &str =
    "Tm93IHRoYXQgeW91J3ZlIGZvdW5kIHRoaXMsIGFyZSB5b3UgcmVhZHkgdG8gam9pbiB1cz8gam9ic0B3YWxsYXBvcC5jb20==";

/// Browser user agent the marketplace accepts without challenge.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:67.0) Gecko/20100101 Firefox/67.0";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WALLARSS_*)
/// 2. TOML config file (if WALLARSS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Public website, used for place lookups and item links.
    ///
    /// Set via WALLARSS_SITE_URL environment variable.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// API host. Signed paths are computed relative to this prefix.
    ///
    /// Set via WALLARSS_API_URL environment variable.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WALLARSS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HMAC key for the `X-Signature` header.
    ///
    /// Set via WALLARSS_SIGNING_KEY environment variable.
    #[serde(default = "default_signing_key")]
    pub signing_key: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via WALLARSS_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a resolved publish date stays cached, in seconds.
    ///
    /// Set via WALLARSS_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Search language sent with every search.
    ///
    /// Set via WALLARSS_LANGUAGE environment variable.
    #[serde(default = "default_language")]
    pub language: String,

    /// Follow search result pages until they reach listings this many days old.
    ///
    /// Set via WALLARSS_SEARCH_MAX_AGE_DAYS environment variable.
    #[serde(default = "default_search_max_age_days")]
    pub search_max_age_days: u64,

    /// Upper bound on result pages fetched per search.
    ///
    /// Set via WALLARSS_SEARCH_MAX_PAGES environment variable.
    #[serde(default = "default_search_max_pages")]
    pub search_max_pages: u32,
}

fn default_site_url() -> String {
    "https://es.wallapop.com".into()
}

fn default_api_url() -> String {
    "https://api.wallapop.com".into()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_signing_key() -> String {
    DEFAULT_SIGNING_KEY.into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_ttl_secs() -> u64 {
    12 * 3600
}

fn default_language() -> String {
    "es_ES".into()
}

fn default_search_max_age_days() -> u64 {
    15
}

fn default_search_max_pages() -> u32 {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            signing_key: default_signing_key(),
            timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            language: default_language(),
            search_max_age_days: default_search_max_age_days(),
            search_max_pages: default_search_max_pages(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Publish date cache TTL as Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Oldest search page worth following, as Duration.
    pub fn search_max_age(&self) -> Duration {
        Duration::from_secs(self.search_max_age_days.saturating_mul(24 * 3600))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WALLARSS_`
    /// 2. TOML file from `WALLARSS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WALLARSS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("WALLARSS_").ignore(&["config_file"]));

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site_url, "https://es.wallapop.com");
        assert_eq!(config.api_url, "https://api.wallapop.com");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.signing_key, DEFAULT_SIGNING_KEY);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.cache_ttl_secs, 43_200);
        assert_eq!(config.language, "es_ES");
        assert_eq!(config.search_max_age_days, 15);
        assert_eq!(config.search_max_pages, 20);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.cache_ttl(), Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.search_max_age(), Duration::from_secs(15 * 24 * 60 * 60));
    }

    #[test]
    fn test_roundtrip_through_figment_defaults() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("cache_ttl_secs = 60\nlanguage = \"en_US\""))
            .extract()
            .unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.language, "en_US");
        assert_eq!(config.api_url, "https://api.wallapop.com");
    }
}
