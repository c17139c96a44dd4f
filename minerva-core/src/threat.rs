//! Link safety verdicts

use serde::{Deserialize, Serialize};

/// Outcome of a threat lookup for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatVerdict {
    Flagged,
    NotFlagged,
}

impl ThreatVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flagged => "FLAGGED",
            Self::NotFlagged => "NOT_FLAGGED",
        }
    }
}

impl std::fmt::Display for ThreatVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single threat list match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatMatch {
    /// e.g. `SOCIAL_ENGINEERING`
    pub threat_type: String,
    /// The submitted URL that matched
    pub matched_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_entry_type: Option<String>,
}

impl ThreatMatch {
    pub fn new(threat_type: &str, matched_url: &str) -> Self {
        Self {
            threat_type: threat_type.to_string(),
            matched_url: matched_url.to_string(),
            platform_type: None,
            threat_entry_type: None,
        }
    }
}

/// Result of checking one URL; produced fresh per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatCheckResult {
    pub verdict: ThreatVerdict,
    pub matches: Vec<ThreatMatch>,
}

impl ThreatCheckResult {
    pub fn not_flagged() -> Self {
        Self {
            verdict: ThreatVerdict::NotFlagged,
            matches: Vec::new(),
        }
    }

    /// Flagged if and only if there is at least one match
    pub fn from_matches(matches: Vec<ThreatMatch>) -> Self {
        let verdict = if matches.is_empty() {
            ThreatVerdict::NotFlagged
        } else {
            ThreatVerdict::Flagged
        };
        Self { verdict, matches }
    }

    pub fn is_flagged(&self) -> bool {
        self.verdict == ThreatVerdict::Flagged
    }

    /// Compact JSON folded into an agent turn
    pub fn to_tool_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"verdict\":\"{}\"}}", self.verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matches_not_flagged() {
        let result = ThreatCheckResult::from_matches(vec![]);
        assert_eq!(result.verdict, ThreatVerdict::NotFlagged);
        assert!(!result.is_flagged());
    }

    #[test]
    fn test_tool_output_shape() {
        let result = ThreatCheckResult::from_matches(vec![ThreatMatch::new(
            "SOCIAL_ENGINEERING",
            "http://bit.ly/xyz",
        )]);
        let json: serde_json::Value = serde_json::from_str(&result.to_tool_output()).unwrap();
        assert_eq!(json["verdict"], "FLAGGED");
        assert_eq!(json["matches"][0]["threat_type"], "SOCIAL_ENGINEERING");
        assert_eq!(json["matches"][0]["matched_url"], "http://bit.ly/xyz");
        assert!(json["matches"][0].get("platform_type").is_none());
    }
}
