//! CLI command implementations

pub mod completions;
pub mod config;
pub mod curate;
pub mod graph;
pub mod sync;
pub mod watch;
