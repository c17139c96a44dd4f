//! Minerva Agents
//!
//! Reasoning units for the scam analysis pipeline:
//! - **Backends**: OpenAI-compatible and Anthropic chat APIs with vision and tool calling
//! - **Tools**: callable capabilities offered to the backend (link safety lookup)
//! - **Roles**: the six pipeline roles and their instructions, loaded from TOML
//! - **Agent**: one role bound to instructions and tools, taking one turn at a time
//!
//! ## Role instructions
//!
//! Instructions live in `prompts/agents.toml` (embedded at build time) and can
//! be overridden with a file of the same shape. See [`roles::RoleConfig`].

pub mod backend;
pub mod anthropic;
pub mod tools;
pub mod roles;
pub mod agent;

pub use backend::*;
pub use anthropic::*;
pub use tools::*;
pub use roles::*;
pub use agent::*;
