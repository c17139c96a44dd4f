//! Minerva pipeline
//!
//! Wires the six analysis roles to one reasoning backend and one link safety
//! checker. The agent list is built once and shared; every analysis runs on
//! its own [`RoundRobinTeam`] so concurrent analyses never share a transcript.

use futures::Stream;
use std::sync::Arc;
use tracing::info;

use minerva_agents::{Agent, AgentRole, ConfigError, RoleConfig, SharedBackend, UrlSafetyTool};
use minerva_core::{ChatMessage, ImageInput, Turn, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MAX_TURNS};
use minerva_safety::UrlSafety;

use crate::{RoundRobinTeam, TeamError};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Turn cutoff for a run
    pub max_turns: u32,
    /// Tool round-trips allowed within one agent turn
    pub max_tool_rounds: u32,
    /// Text that ends a run early when an agent emits it (off when `None`)
    pub stop_signal: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            stop_signal: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_stop_signal(mut self, signal: &str) -> Self {
        self.stop_signal = Some(signal.to_string());
        self
    }
}

/// The scam analysis pipeline
pub struct Minerva {
    config: PipelineConfig,
    agents: Arc<Vec<Agent>>,
}

impl Minerva {
    /// Build the six agents in speaking order; fails if any role lacks instructions
    pub fn new(
        config: PipelineConfig,
        roles: &RoleConfig,
        backend: SharedBackend,
        checker: Arc<dyn UrlSafety>,
    ) -> Result<Self, ConfigError> {
        roles.validate()?;

        let link_tool = UrlSafetyTool::shared(checker);
        let mut agents = Vec::with_capacity(AgentRole::ALL.len());

        for role in AgentRole::ALL {
            let mut agent = Agent::for_role(role, roles, backend.clone())?
                .with_max_tool_rounds(config.max_tool_rounds);
            if role.uses_link_tool() {
                agent = agent.with_tool(link_tool.clone());
            }
            agents.push(agent);
        }

        info!(
            "Initialized {} agents on {} (max {} turns)",
            agents.len(),
            backend.model_name(),
            config.max_turns
        );

        Ok(Self {
            config,
            agents: Arc::new(agents),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// A fresh coordinator over the shared agents
    pub fn team(&self) -> RoundRobinTeam {
        RoundRobinTeam::new(self.agents.clone(), self.config.max_turns)
            .with_stop_signal(self.config.stop_signal.clone())
    }

    /// Analyze a screenshot, streaming each agent turn
    pub fn analyze<'a>(
        &self,
        team: &'a mut RoundRobinTeam,
        image: ImageInput,
    ) -> impl Stream<Item = Result<Turn, TeamError>> + 'a {
        info!(
            "Analyzing {} screenshot ({} bytes, fingerprint {})",
            image.media_type,
            image.data.len(),
            image.fingerprint()
        );
        team.run_stream(ChatMessage::image(image))
    }
}
