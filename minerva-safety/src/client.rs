//! Safety service configuration and HTTP client
//!
//! Creates the HTTP client shared by redirect expansion and threat lookups.

use reqwest::{redirect, Client};
use std::time::Duration;
use thiserror::Error;

/// Default Safe Browsing API base
pub const SAFE_BROWSING_API_BASE: &str = "https://safebrowsing.googleapis.com/v4";

/// Threat lists every lookup is matched against
pub const THREAT_TYPES: &[&str] = &[
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

/// Link safety configuration
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Safe Browsing API key (checks fail with a configuration error without it)
    pub api_key: Option<String>,
    /// API base URL
    pub api_base_url: String,
    /// Client identifier reported to the service
    pub client_id: String,
    /// Client version reported to the service
    pub client_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum redirects followed while expanding a URL
    pub max_redirects: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("SAFEBROWSING_API_KEY").ok(),
            api_base_url: SAFE_BROWSING_API_BASE.to_string(),
            client_id: "minerva".to_string(),
            client_version: "0.1.0".to_string(),
            timeout_secs: 15,
            max_redirects: 10,
        }
    }
}

impl SafetyConfig {
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// The API key, treating an empty value as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Lookup endpoint including the key query parameter
    pub fn find_endpoint(&self, api_key: &str) -> String {
        format!("{}/threatMatches:find?key={}", self.api_base_url, api_key)
    }
}

/// Errors from link safety checks
#[derive(Debug, Error)]
pub enum SafetyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Threat service error: {0}")]
    Service(String),

    #[error("Failed to decode threat service response: {0}")]
    Decode(String),
}

/// Create the HTTP client used for expansion and lookups
pub fn create_safety_client(config: &SafetyConfig) -> Result<Client, SafetyError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(redirect::Policy::limited(config.max_redirects))
        .user_agent(format!("{}/{}", config.client_id, config.client_version))
        .build()
        .map_err(|e| SafetyError::Configuration(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SafetyConfig::default();
        assert_eq!(config.client_id, "minerva");
        assert_eq!(config.api_base_url, SAFE_BROWSING_API_BASE);
        assert_eq!(THREAT_TYPES.len(), 4);
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = SafetyConfig::default().with_api_key(Some("  ".to_string()));
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_find_endpoint() {
        let config = SafetyConfig::default().with_base_url("http://localhost:8080/v4/");
        assert_eq!(
            config.find_endpoint("k"),
            "http://localhost:8080/v4/threatMatches:find?key=k"
        );
    }
}
