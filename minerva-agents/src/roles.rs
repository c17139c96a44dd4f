//! Pipeline roles and their instructions
//!
//! Roles are plain data, not types: each of the six roles is an entry in a
//! TOML mapping from role key to instruction text, loaded once at startup.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors loading role configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read role config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse role config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing instructions for required role '{0}'")]
    MissingRole(String),
}

/// The six roles of the analysis pipeline, in speaking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    OcrSpecialist,
    UrlChecker,
    ContentAnalyst,
    DecisionMaker,
    SummaryAgent,
    LanguageTranslationAgent,
}

impl AgentRole {
    /// Every role in round-robin order
    pub const ALL: [AgentRole; 6] = [
        AgentRole::OcrSpecialist,
        AgentRole::UrlChecker,
        AgentRole::ContentAnalyst,
        AgentRole::DecisionMaker,
        AgentRole::SummaryAgent,
        AgentRole::LanguageTranslationAgent,
    ];

    /// Key of the role's table in the config file
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::OcrSpecialist => "ocr_agent",
            Self::UrlChecker => "url_checker_agent",
            Self::ContentAnalyst => "content_agent",
            Self::DecisionMaker => "decision_agent",
            Self::SummaryAgent => "summary_agent",
            Self::LanguageTranslationAgent => "language_translation_agent",
        }
    }

    /// Agent ID used as turn author
    pub fn agent_id(&self) -> &'static str {
        match self {
            Self::OcrSpecialist => "OCR_Specialist",
            Self::UrlChecker => "URL_Checker",
            Self::ContentAnalyst => "Content_Analyst",
            Self::DecisionMaker => "Decision_Maker",
            Self::SummaryAgent => "Summary_Agent",
            Self::LanguageTranslationAgent => "Language_Translation_Agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::OcrSpecialist => "Extracts text from an image",
            Self::UrlChecker => "Checks if a URL is safe",
            Self::ContentAnalyst => "Analyzes the text for scam patterns",
            Self::DecisionMaker => "Synthesizes the analyses and makes the final determination",
            Self::SummaryAgent => "Generates a summary of the final determination",
            Self::LanguageTranslationAgent => "Translates the summary to the user language",
        }
    }

    /// Whether the role is offered the link safety tool
    pub fn uses_link_tool(&self) -> bool {
        matches!(self, Self::UrlChecker | Self::ContentAnalyst)
    }
}

/// Instructions for one role
#[derive(Debug, Clone, Deserialize)]
pub struct RoleInstructions {
    /// System-level directive for the role
    pub assignment: String,
}

/// Mapping from role key to instructions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RoleConfig {
    roles: HashMap<String, RoleInstructions>,
}

impl RoleConfig {
    /// Load the instructions shipped with the crate
    pub fn load_embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(include_str!("../prompts/agents.toml"))
    }

    /// Load instructions from a TOML file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Instructions for a role; blank instructions count as missing
    pub fn instructions(&self, role: AgentRole) -> Result<&str, ConfigError> {
        self.roles
            .get(role.config_key())
            .map(|r| r.assignment.trim())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConfigError::MissingRole(role.config_key().to_string()))
    }

    /// Fail on the first required role without instructions
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in AgentRole::ALL {
            self.instructions(role)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_covers_all_roles() {
        let config = RoleConfig::load_embedded().unwrap();
        assert!(config.validate().is_ok());
        assert!(config.len() >= 6);
    }

    #[test]
    fn test_missing_role_is_fatal() {
        let config = RoleConfig::from_toml_str(
            r#"
            [ocr_agent]
            assignment = "Extract the text."
            "#,
        )
        .unwrap();

        match config.validate() {
            Err(ConfigError::MissingRole(key)) => assert_eq!(key, "url_checker_agent"),
            other => panic!("expected missing role, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_assignment_counts_as_missing() {
        let config = RoleConfig::from_toml_str(
            r#"
            [ocr_agent]
            assignment = "   "
            "#,
        )
        .unwrap();
        assert!(config.instructions(AgentRole::OcrSpecialist).is_err());
    }

    #[test]
    fn test_role_order_and_tools() {
        let ids: Vec<_> = AgentRole::ALL.iter().map(|r| r.agent_id()).collect();
        assert_eq!(ids[0], "OCR_Specialist");
        assert_eq!(ids[5], "Language_Translation_Agent");

        let with_tools: Vec<_> = AgentRole::ALL.iter().filter(|r| r.uses_link_tool()).collect();
        assert_eq!(with_tools, vec![&AgentRole::UrlChecker, &AgentRole::ContentAnalyst]);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            RoleConfig::from_toml_str("not = [valid"),
            Err(ConfigError::Parse(_))
        ));
    }
}
