//! Tools offered to reasoning backends
//!
//! A tool has a name, a natural-language description and a JSON schema for
//! its arguments; the backend decides when to invoke it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use minerva_safety::{SafetyError, UrlSafety};

use crate::ToolSpec;

/// Errors from tool execution
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Link safety check failed: {0}")]
    Safety(#[from] SafetyError),
}

impl ToolError {
    /// Fatal errors abort the run; the rest are reported back to the backend
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Safety(_))
    }
}

/// A callable capability
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with already-parsed arguments, returning text for the backend
    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Thread-safe reference to a tool
pub type SharedTool = Arc<dyn Tool>;

/// Name under which the link safety check is offered
pub const URL_SAFETY_TOOL: &str = "is_url_safe";

#[derive(Debug, Deserialize)]
struct UrlArguments {
    url: String,
}

/// Exposes a [`UrlSafety`] checker as the `is_url_safe` tool
pub struct UrlSafetyTool {
    checker: Arc<dyn UrlSafety>,
}

impl UrlSafetyTool {
    pub fn new(checker: Arc<dyn UrlSafety>) -> Self {
        Self { checker }
    }

    pub fn shared(checker: Arc<dyn UrlSafety>) -> SharedTool {
        Arc::new(Self::new(checker))
    }
}

#[async_trait]
impl Tool for UrlSafetyTool {
    fn name(&self) -> &str {
        URL_SAFETY_TOOL
    }

    fn description(&self) -> &str {
        "Checks if a URL is safe"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to check, exactly as it appears in the message"
                }
            },
            "required": ["url"]
        })
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: UrlArguments = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let url = args.url.trim();
        if url.is_empty() {
            return Err(ToolError::InvalidArguments("url is empty".to_string()));
        }

        info!("Checking URL safety: {}", url);
        let result = self.checker.check(url).await?;
        Ok(result.to_tool_output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minerva_core::{ThreatCheckResult, ThreatMatch};

    struct FlagEverything;

    #[async_trait]
    impl UrlSafety for FlagEverything {
        async fn check(&self, url: &str) -> Result<ThreatCheckResult, SafetyError> {
            Ok(ThreatCheckResult::from_matches(vec![ThreatMatch::new(
                "SOCIAL_ENGINEERING",
                url,
            )]))
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl UrlSafety for Unconfigured {
        async fn check(&self, _url: &str) -> Result<ThreatCheckResult, SafetyError> {
            Err(SafetyError::Configuration("SAFEBROWSING_API_KEY is missing".to_string()))
        }
    }

    #[tokio::test]
    async fn test_tool_output_is_threat_json() {
        let tool = UrlSafetyTool::new(Arc::new(FlagEverything));
        let output = tool.call(json!({"url": "http://bit.ly/xyz"})).await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["verdict"], "FLAGGED");
        assert_eq!(parsed["matches"][0]["matched_url"], "http://bit.ly/xyz");
    }

    #[tokio::test]
    async fn test_bad_arguments_not_fatal() {
        let tool = UrlSafetyTool::new(Arc::new(FlagEverything));
        let err = tool.call(json!({"link": "http://bit.ly/xyz"})).await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_credential_is_fatal() {
        let tool = UrlSafetyTool::new(Arc::new(Unconfigured));
        let err = tool.call(json!({"url": "http://bit.ly/xyz"})).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ToolError::Safety(SafetyError::Configuration(_))));
    }

    #[test]
    fn test_spec() {
        let tool = UrlSafetyTool::new(Arc::new(FlagEverything));
        let spec = tool.spec();
        assert_eq!(spec.name, "is_url_safe");
        assert_eq!(spec.parameters["required"][0], "url");
    }
}
