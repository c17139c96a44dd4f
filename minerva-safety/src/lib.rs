//! Minerva Link Safety
//!
//! Checks URLs found in screenshots against a threat-matching service:
//! - Redirect expansion (shortened links are resolved before lookup)
//! - Safe Browsing `threatMatches:find` requests
//! - Fatal configuration errors, surfaced service errors

pub mod client;
pub mod checker;

pub use client::*;
pub use checker::*;
