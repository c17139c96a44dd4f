//! Run state - the transcript plus the turn accounting of one analysis
//!
//! A run state is owned by exactly one coordinator. It is created fresh per
//! analysis and cleared with [`RunState::reset`]; it is never rolled back.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{ChatMessage, Transcript, Turn};

/// Errors from run state transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Run already started; reset before starting a new one")]
    NotReset,

    #[error("Run has terminated")]
    Terminated,

    #[error("Run has not started")]
    NotStarted,
}

/// State of one turn-bounded analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Correlation ID for logs, regenerated on reset
    run_id: Uuid,
    /// Seed message the run was started with
    task: Option<ChatMessage>,
    /// Turns appended so far
    transcript: Transcript,
    /// Number of completed turns
    turn_count: u32,
    /// Hard turn cutoff
    max_turns: u32,
    /// Index of the agent that speaks next
    next_agent: usize,
    /// Whether the run has started (finished, failed or abandoned runs stay started)
    started: bool,
    /// No further turns may be appended
    terminated: bool,
}

impl RunState {
    pub fn new(max_turns: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: None,
            transcript: Transcript::new(),
            turn_count: 0,
            max_turns,
            next_agent: 0,
            started: false,
            terminated: false,
        }
    }

    /// Start the run with its seed message
    pub fn begin(&mut self, task: ChatMessage) -> Result<(), StateError> {
        if self.started {
            return Err(StateError::NotReset);
        }
        self.started = true;
        self.task = Some(task);
        if self.max_turns == 0 {
            self.terminated = true;
        }
        Ok(())
    }

    /// Append a completed turn and advance the rotation over `agent_count` agents
    pub fn record(&mut self, turn: Turn, agent_count: usize) -> Result<&Turn, StateError> {
        if !self.started {
            return Err(StateError::NotStarted);
        }
        if self.terminated || self.turn_count >= self.max_turns {
            return Err(StateError::Terminated);
        }

        self.transcript.append(turn);
        self.turn_count += 1;
        if agent_count > 0 {
            self.next_agent = (self.next_agent + 1) % agent_count;
        }
        if self.turn_count == self.max_turns {
            self.terminated = true;
        }

        // Just appended above
        self.transcript.last().ok_or(StateError::NotStarted)
    }

    /// Stop the run; later turns are rejected
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Clear all per-run data so the state can be reused
    pub fn reset(&mut self) {
        self.run_id = Uuid::new_v4();
        self.task = None;
        self.transcript.clear();
        self.turn_count = 0;
        self.next_agent = 0;
        self.started = false;
        self.terminated = false;
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task(&self) -> Option<&ChatMessage> {
        self.task.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn next_agent(&self) -> usize {
        self.next_agent
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Sequence number the next appended turn must carry
    pub fn next_sequence(&self) -> u32 {
        self.turn_count + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TurnContent;

    fn turn(state: &RunState, author: &str) -> Turn {
        Turn::new(author, TurnContent::text("ok"), state.next_sequence())
    }

    #[test]
    fn test_turn_count_never_exceeds_max() {
        let mut state = RunState::new(3);
        state.begin(ChatMessage::text("task")).unwrap();

        for i in 0..5 {
            let t = turn(&state, &format!("agent-{}", i));
            let _ = state.record(t, 2);
            assert!(state.turn_count() <= state.max_turns());
        }

        assert_eq!(state.turn_count(), 3);
        assert!(state.is_terminated());
        assert_eq!(state.transcript().len(), 3);
    }

    #[test]
    fn test_rotation_wraps() {
        let mut state = RunState::new(10);
        state.begin(ChatMessage::text("task")).unwrap();

        let indices: Vec<usize> = (0..4)
            .map(|_| {
                let idx = state.next_agent();
                let t = turn(&state, "x");
                state.record(t, 3).unwrap();
                idx
            })
            .collect();

        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_begin_twice_requires_reset() {
        let mut state = RunState::new(6);
        state.begin(ChatMessage::text("first")).unwrap();
        assert_eq!(state.begin(ChatMessage::text("second")), Err(StateError::NotReset));

        let old_run = state.run_id();
        state.reset();
        assert_ne!(state.run_id(), old_run);
        assert!(state.transcript().is_empty());
        assert!(state.begin(ChatMessage::text("second")).is_ok());
    }

    #[test]
    fn test_terminated_rejects_turns() {
        let mut state = RunState::new(6);
        state.begin(ChatMessage::text("task")).unwrap();
        state.terminate();

        let t = turn(&state, "late");
        assert_eq!(state.record(t, 6).unwrap_err(), StateError::Terminated);
        assert!(state.transcript().is_empty());
    }

    #[test]
    fn test_zero_max_turns_terminates_immediately() {
        let mut state = RunState::new(0);
        state.begin(ChatMessage::text("task")).unwrap();
        assert!(state.is_terminated());
    }
}
