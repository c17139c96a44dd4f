//! Minerva Core - domain model for multi-agent scam analysis
//!
//! This crate provides the foundational primitives:
//! - Multimodal chat messages and screenshot input
//! - Turns and the append-only transcript shared by agents
//! - Run state with turn-bounded termination
//! - Threat check results from link safety lookups
//! - Verdict extraction from the final agent turn

pub mod message;
pub mod turn;
pub mod state;
pub mod threat;
pub mod verdict;

pub use message::*;
pub use turn::*;
pub use state::*;
pub use threat::*;
pub use verdict::*;

/// Default turn cutoff: one pass through the six agent roles
pub const DEFAULT_MAX_TURNS: u32 = 6;

/// Default ceiling on tool round-trips within a single agent turn
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 3;

/// Shown when a run ends without a usable final turn
pub const NO_ANALYSIS_MESSAGE: &str = "No analysis available. Try again later.";

/// Shown when a run fails at any point
pub const ANALYSIS_ERROR_MESSAGE: &str = "Error during analysis. Try again later.";

/// Source label of the seed message submitted by the user
pub const USER_SOURCE: &str = "User";
