//! Round-robin team coordinator
//!
//! Drives a fixed, ordered list of agents over one shared transcript:
//! - Agents speak in strict rotation, wrapping around the list
//! - Every agent sees the seed message plus every earlier turn
//! - The run ends after `max_turns` turns or when a turn carries the stop signal
//! - Turns are produced on demand as the consumer polls the stream

use async_stream::stream;
use futures::Stream;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use minerva_agents::{Agent, AgentError};
use minerva_core::{ChatMessage, StateError, Turn, RunState};

/// Errors ending a team run
#[derive(Debug, Error)]
pub enum TeamError {
    #[error("Agent {agent} failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AgentError,
    },

    #[error("Run state error: {0}")]
    State(#[from] StateError),
}

impl TeamError {
    /// The run was already started and must be reset first
    pub fn is_not_reset(&self) -> bool {
        matches!(self, Self::State(StateError::NotReset))
    }
}

/// Coordinator for one run at a time over a shared agent list
pub struct RoundRobinTeam {
    agents: Arc<Vec<Agent>>,
    state: RunState,
    stop_signal: Option<String>,
}

impl RoundRobinTeam {
    pub fn new(agents: Arc<Vec<Agent>>, max_turns: u32) -> Self {
        Self {
            agents,
            state: RunState::new(max_turns),
            stop_signal: None,
        }
    }

    /// End the run early when a turn's text contains `signal`
    pub fn with_stop_signal(mut self, signal: Option<String>) -> Self {
        self.stop_signal = signal.filter(|s| !s.is_empty());
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.id()).collect()
    }

    /// Discard the transcript and counters so the team can run again
    pub fn reset(&mut self) {
        debug!("Resetting team run {}", self.state.run_id());
        self.state.reset();
    }

    fn hits_stop_signal(&self, turn: &Turn) -> bool {
        match &self.stop_signal {
            Some(signal) => turn.text().contains(signal.as_str()),
            None => false,
        }
    }

    /// Run the team on `task`, yielding each turn as soon as it is produced
    ///
    /// Nothing happens until the stream is polled. An agent failure ends the
    /// stream with a single `Err` after the turns already yielded; dropping
    /// the stream cancels the turn in flight. Either way the run stays
    /// started until [`reset`](Self::reset).
    pub fn run_stream(
        &mut self,
        task: ChatMessage,
    ) -> impl Stream<Item = Result<Turn, TeamError>> + '_ {
        stream! {
            if let Err(e) = self.state.begin(task) {
                yield Err(TeamError::from(e));
                return;
            }

            let agents = self.agents.clone();
            if agents.is_empty() {
                self.state.terminate();
            }

            info!(
                "Team run {} starting with {} agents (max {} turns)",
                self.state.run_id(),
                agents.len(),
                self.state.max_turns()
            );

            while !self.state.is_terminated() {
                let agent = &agents[self.state.next_agent()];
                let sequence = self.state.next_sequence();

                let Some(task) = self.state.task() else {
                    yield Err(TeamError::from(StateError::NotStarted));
                    return;
                };

                debug!("Turn {} -> {}", sequence, agent.id());
                let result = agent.take_turn(task, self.state.transcript(), sequence).await;
                let turn = match result {
                    Ok(turn) => turn,
                    Err(source) => {
                        error!("Agent {} error: {}", agent.id(), source);
                        self.state.terminate();
                        yield Err(TeamError::Agent {
                            agent: agent.id().to_string(),
                            source,
                        });
                        return;
                    }
                };

                let stop = self.hits_stop_signal(&turn);
                let turn = match self.state.record(turn, agents.len()) {
                    Ok(turn) => turn.clone(),
                    Err(e) => {
                        yield Err(TeamError::from(e));
                        return;
                    }
                };

                if stop {
                    info!("Stop signal from {}, ending run", turn.author);
                    self.state.terminate();
                }

                yield Ok(turn);
            }

            info!(
                "Team run {} finished after {} turns",
                self.state.run_id(),
                self.state.turn_count()
            );
        }
    }
}
