//! Link Safety Checker
//!
//! Resolves redirects for a URL and submits the original and (if different)
//! expanded URL to the Safe Browsing threat list. Broken redirects are never
//! fatal; transport failures of the lookup itself always are, so a failed
//! lookup is never reported as "safe".

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use minerva_core::{ThreatCheckResult, ThreatMatch};

use crate::{create_safety_client, SafetyConfig, SafetyError, THREAT_TYPES};

/// Anything that can judge a URL
#[async_trait]
pub trait UrlSafety: Send + Sync {
    async fn check(&self, url: &str) -> Result<ThreatCheckResult, SafetyError>;
}

/// Safe Browsing backed checker
pub struct LinkSafetyChecker {
    config: SafetyConfig,
    client: Client,
}

impl LinkSafetyChecker {
    pub fn new(config: SafetyConfig) -> Result<Self, SafetyError> {
        let client = create_safety_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Follow redirects with a HEAD request; falls back to the input URL
    pub async fn expand_url(&self, url: &str) -> String {
        match self.client.head(url).send().await {
            Ok(response) => response.url().to_string(),
            Err(e) => {
                debug!("Redirect expansion failed for {}: {}", url, e);
                url.to_string()
            }
        }
    }

    async fn find_matches(
        &self,
        api_key: &str,
        request: &FindThreatMatchesRequest,
    ) -> Result<ThreatCheckResult, SafetyError> {
        let response = self
            .client
            .post(self.config.find_endpoint(api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| SafetyError::Service(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SafetyError::Service(format!("threat service returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SafetyError::Service(e.without_url().to_string()))?;

        interpret_response(&body)
    }
}

#[async_trait]
impl UrlSafety for LinkSafetyChecker {
    async fn check(&self, url: &str) -> Result<ThreatCheckResult, SafetyError> {
        let api_key = self.config.api_key().ok_or_else(|| {
            SafetyError::Configuration("SAFEBROWSING_API_KEY is missing".to_string())
        })?;

        let expanded = self.expand_url(url).await;
        if !same_url(url, &expanded) {
            debug!("Expanded {} -> {}", url, expanded);
        }

        let request = build_request(&self.config, url, &expanded);
        let result = self.find_matches(api_key, &request).await?;

        if result.is_flagged() {
            warn!("URL {} flagged with {} threat match(es)", url, result.matches.len());
        } else {
            info!("URL {} not flagged", url);
        }

        Ok(result)
    }
}

/// Build the lookup body: the original URL plus the expanded one when it differs
pub fn build_request(config: &SafetyConfig, url: &str, expanded_url: &str) -> FindThreatMatchesRequest {
    let mut threat_entries = vec![ThreatEntry {
        url: url.to_string(),
    }];
    if !same_url(url, expanded_url) {
        threat_entries.push(ThreatEntry {
            url: expanded_url.to_string(),
        });
    }

    FindThreatMatchesRequest {
        client: ClientInfo {
            client_id: config.client_id.clone(),
            client_version: config.client_version.clone(),
        },
        threat_info: ThreatInfo {
            threat_types: THREAT_TYPES.iter().map(|t| t.to_string()).collect(),
            platform_types: vec!["ANY_PLATFORM".to_string()],
            threat_entry_types: vec!["URL".to_string()],
            threat_entries,
        },
    }
}

/// Compare URLs by their parsed form, so `http://a.example` equals `http://a.example/`
fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Interpret a lookup response body; an empty body or object means no threats
pub fn interpret_response(body: &str) -> Result<ThreatCheckResult, SafetyError> {
    if body.trim().is_empty() {
        return Ok(ThreatCheckResult::not_flagged());
    }

    let response: FindThreatMatchesResponse =
        serde_json::from_str(body).map_err(|e| SafetyError::Decode(e.to_string()))?;

    let matches = response
        .matches
        .into_iter()
        .map(|m| ThreatMatch {
            threat_type: m.threat_type,
            matched_url: m.threat.url,
            platform_type: m.platform_type,
            threat_entry_type: m.threat_entry_type,
        })
        .collect();

    Ok(ThreatCheckResult::from_matches(matches))
}

// Safe Browsing v4 wire types
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindThreatMatchesRequest {
    pub client: ClientInfo,
    pub threat_info: ThreatInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: String,
    pub client_version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatInfo {
    pub threat_types: Vec<String>,
    pub platform_types: Vec<String>,
    pub threat_entry_types: Vec<String>,
    pub threat_entries: Vec<ThreatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatEntry {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct FindThreatMatchesResponse {
    #[serde(default)]
    matches: Vec<ApiThreatMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiThreatMatch {
    threat_type: String,
    #[serde(default)]
    platform_type: Option<String>,
    #[serde(default)]
    threat_entry_type: Option<String>,
    threat: ThreatEntry,
}
