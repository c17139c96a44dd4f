//! Turns and the shared transcript
//!
//! A turn is one agent's contribution to an analysis. Ordering is the only
//! coordination signal between agents: each agent reads every earlier turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tool invocation executed during a turn, with its textual output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Backend-assigned call identifier
    pub call_id: String,
    /// Name of the invoked tool
    pub tool_name: String,
    /// Arguments as requested by the backend
    pub arguments: serde_json::Value,
    /// Output fed back to the backend
    pub output: String,
}

/// What an agent produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    /// Final text from the reasoning backend
    Text { text: String },
    /// The turn ended on tool results without a final text
    ToolSummary { executions: Vec<ToolExecution> },
}

impl TurnContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text rendering of the content
    pub fn as_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::ToolSummary { executions } => executions
                .iter()
                .map(|e| e.output.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.trim().is_empty(),
            Self::ToolSummary { executions } => executions.is_empty(),
        }
    }
}

/// One agent's contribution to the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// ID of the authoring agent
    pub author: String,
    /// Produced content
    pub content: TurnContent,
    /// 1-based position in the transcript
    pub sequence_number: u32,
    /// Tools executed while producing this turn
    pub tool_calls: Vec<ToolExecution>,
    /// Completion time
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(author: &str, content: TurnContent, sequence_number: u32) -> Self {
        Self {
            author: author.to_string(),
            content,
            sequence_number,
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolExecution>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn text(&self) -> String {
        self.content.as_text()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn; sequence numbers are expected to be contiguous
    pub fn append(&mut self, turn: Turn) {
        debug_assert_eq!(turn.sequence_number as usize, self.turns.len() + 1);
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Authors in transcript order
    pub fn authors(&self) -> Vec<&str> {
        self.turns.iter().map(|t| t.author.as_str()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}
