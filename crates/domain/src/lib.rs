//! Shared types for the wagate crates: configuration, the common error
//! type and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
