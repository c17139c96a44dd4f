//! Minerva Runtime
//!
//! Runs the scam analysis team:
//! - **Team**: round-robin coordinator over a shared agent list
//! - **Pipeline**: the six-role `Minerva` facade
//! - **Presenter**: progressive display updates ending in a verdict
//! - **Store**: SQLite persistence of final verdicts

pub mod team;
pub mod pipeline;
pub mod formatter;
pub mod presenter;
pub mod store;

pub use team::*;
pub use pipeline::*;
pub use formatter::*;
pub use presenter::*;
pub use store::*;
